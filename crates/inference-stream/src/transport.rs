use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::TransportError;
use crate::event::StreamEvent;
use crate::request::StreamRequest;

/// Stable identifier for a transport implementation (for example `sse`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TransportId(pub String);

impl TransportId {
    /// Creates a transport id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the transport id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransportId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TransportId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Normalized event stream yielded by a connected transport.
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, TransportError>> + Send + 'static>>;

/// Releases the wire-level connection during closure.
#[async_trait::async_trait]
pub trait TransportCloser: Send {
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// One live connection: the event stream plus the handle that releases it.
///
/// The event stream is dropped before `closer.close()` runs, so a closer may
/// assume the read side is gone.
pub struct TransportConnection {
    pub events: EventStream,
    pub closer: Box<dyn TransportCloser>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Adapts one wire protocol into the normalized event contract.
///
/// Adapters own URL construction and connection establishment; the reconciler
/// never sees wire bytes.
#[async_trait::async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Returns the stable id callers use to select this transport.
    fn id(&self) -> TransportId;

    /// Ceiling applied to a stream when the request does not override it.
    ///
    /// `None` means the stream is only bounded by end-markers or a transport
    /// error.
    fn default_deadline(&self) -> Option<Duration> {
        None
    }

    /// Establishes one connection for the given request.
    async fn connect(&self, request: &StreamRequest) -> Result<TransportConnection, TransportError>;
}

/// Closer for transports where dropping the event stream already releases the
/// connection.
pub struct DropCloser;

#[async_trait::async_trait]
impl TransportCloser for DropCloser {
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
