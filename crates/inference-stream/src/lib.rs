//! Dual-transport streaming inference client with a builder-first async API.
//!
//! One request yields an incrementally delivered response multiplexing two
//! independent sub-streams (text, audio) plus status updates over a single
//! connection. The transport-independent reconciler tracks completion of the
//! sub-streams, delivers callbacks in strict arrival order, and closes the
//! connection and fires the terminal completion callback exactly once.
//!
//! # Builder-first usage (SSE)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use inference_stream::prelude::*;
//! use inference_stream::transports::{EndpointConfig, SseTransport, WsTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let client = StreamClient::builder()
//!     .register_transport(Arc::new(SseTransport::new(EndpointConfig::new(
//!         "https://chat.example.com",
//!     ))?))
//!     .register_transport(Arc::new(WsTransport::new(EndpointConfig::new(
//!         "wss://chat.example.com",
//!     ))))
//!     .build()?;
//!
//! let text = client
//!     .stream("sse")
//!     .prompt("Say hello")
//!     .web_search(true)
//!     .collect_text()
//!     .await?;
//!
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

/// Decoded audio segment type and base64 unwrapping.
pub mod audio;
/// Client entry point, stream builder and stop handle.
pub mod client;
/// Public error types used by the client API.
pub mod errors;
/// Normalized stream events and the shared wire message shape.
pub mod event;
/// Consumer-side callback contract.
pub mod handler;
/// Common imports for typical usage.
pub mod prelude;
/// The dual sub-stream completion reconciler.
pub mod reconciler;
/// Request parameters for one streaming call.
pub mod request;
/// Transport adapter contracts used by the built-in transports.
pub mod transport;
/// Built-in SSE and WebSocket transport adapters.
pub mod transports;

pub use audio::{AUDIO_MIME, AudioBlob};
pub use client::{ActiveStream, StopHandle, StreamBuilder, StreamClient, StreamClientBuilder};
pub use errors::{StreamError, TransportError};
pub use event::{StreamEvent, WireMessage};
pub use handler::{NullHandler, StreamHandler};
pub use reconciler::{EndReason, StreamOutcome};
pub use request::StreamRequest;
pub use transport::{
    DropCloser, EventStream, TransportAdapter, TransportCloser, TransportConnection, TransportId,
};
