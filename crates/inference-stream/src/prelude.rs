//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used builder/runtime
//! types so examples and application code need fewer import lines.
pub use crate::{
    ActiveStream, AudioBlob, EndReason, NullHandler, StopHandle, StreamBuilder, StreamClient,
    StreamClientBuilder, StreamError, StreamHandler, StreamOutcome, TransportId,
};
