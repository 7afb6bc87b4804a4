//! Built-in transport adapters.
//!
//! Both adapters translate the same wire JSON message shape into normalized
//! [`StreamEvent`](crate::event::StreamEvent)s; only connection establishment
//! and framing differ.
mod config;
mod sse;
mod ws;

pub use config::EndpointConfig;
pub use sse::{SSE_TRANSPORT, SseTransport};
pub use ws::{WS_TRANSPORT, WsTransport};
