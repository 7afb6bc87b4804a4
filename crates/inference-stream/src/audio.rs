use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::errors::TransportError;
use crate::transport::TransportId;

/// MIME type every audio segment is tagged with.
pub const AUDIO_MIME: &str = "audio/mpeg";

/// One decoded audio segment, ready for an audio consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioBlob {
    /// Decoded audio bytes.
    pub data: bytes::Bytes,
    /// Always [`AUDIO_MIME`].
    pub mime: &'static str,
    /// Text this segment corresponds to; informational only.
    pub text: String,
}

impl AudioBlob {
    /// Decodes a base64 wire payload into a tagged blob.
    ///
    /// A payload that is not valid base64 is a malformed-payload transport
    /// error.
    pub fn from_base64(
        transport: &TransportId,
        base64_audio: &str,
        associated_text: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let data = STANDARD.decode(base64_audio).map_err(|e| {
            TransportError::malformed(
                transport.clone(),
                format!("invalid base64 audio payload: {e}"),
            )
        })?;
        Ok(Self {
            data: bytes::Bytes::from(data),
            mime: AUDIO_MIME,
            text: associated_text.into(),
        })
    }
}
