use crate::transport::TransportId;

/// Errors produced by a transport adapter for a single connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection establishment failed (HTTP status, handshake, DNS, etc.).
    #[error("connect failed ({transport}): {message}")]
    Connect {
        transport: TransportId,
        message: String,
        status_code: Option<u16>,
    },
    /// The underlying stream reported a protocol-level failure mid-flight.
    #[error("stream read failed ({transport}): {message}")]
    Read {
        transport: TransportId,
        message: String,
    },
    /// An inbound message failed to parse as the expected shape
    /// (wire JSON or base64 audio payload).
    #[error("malformed payload ({transport}): {message}")]
    MalformedPayload {
        transport: TransportId,
        message: String,
    },
    /// Releasing the connection failed.
    ///
    /// Closure is best-effort: this variant is logged at the closure site and
    /// never propagated past it.
    #[error("close failed ({transport}): {message}")]
    Close {
        transport: TransportId,
        message: String,
    },
}

impl TransportError {
    /// Creates a connection-establishment error.
    pub fn connect(
        transport: impl Into<TransportId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Connect {
            transport: transport.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a mid-stream read error.
    pub fn read(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::Read {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed-payload error.
    pub fn malformed(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Creates a connection-release error.
    pub fn close(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::Close {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Returns the transport associated with this error.
    pub fn transport_id(&self) -> &TransportId {
        match self {
            Self::Connect { transport, .. }
            | Self::Read { transport, .. }
            | Self::MalformedPayload { transport, .. }
            | Self::Close { transport, .. } => transport,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Connect { message, .. }
            | Self::Read { message, .. }
            | Self::MalformedPayload { message, .. }
            | Self::Close { message, .. } => message,
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Invalid client or transport configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested transport is not registered with the client.
    #[error("transport not found: {transport}")]
    TransportNotFound { transport: TransportId },
    /// Terminal stream fault.
    ///
    /// Surfaced only after closure has completed, so the completion callback
    /// has already fired by the time the caller observes this.
    #[error(transparent)]
    Transport(TransportError),
    /// Internal invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StreamError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<TransportError> for StreamError {
    fn from(value: TransportError) -> Self {
        StreamError::Transport(value)
    }
}
