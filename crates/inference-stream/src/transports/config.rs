use std::time::Duration;

use crate::errors::StreamError;

/// Endpoint configuration shared by the transport adapters.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    /// Base URL of the streaming backend (`http(s)://` for SSE,
    /// `ws(s)://` for WebSocket).
    pub base_url: String,
    /// Timeout applied to connection establishment only; never to the
    /// stream itself.
    pub connect_timeout: Duration,
}

impl EndpointConfig {
    /// Creates a config with sensible defaults and a provided base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Builds a config from `INFERENCE_STREAM_URL`.
    pub fn from_env() -> Result<Self, StreamError> {
        let base_url = std::env::var("INFERENCE_STREAM_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(StreamError::Config(
                "missing INFERENCE_STREAM_URL for transport endpoint".into(),
            ));
        }
        Ok(Self::new(base_url))
    }

    /// Overrides the connection-establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub(crate) fn joined(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
