use std::collections::BTreeMap;

use crate::errors::TransportError;
use crate::transport::TransportId;

/// Normalized stream events produced by a transport adapter.
///
/// Transport faults travel as the `Err` arm of the event stream, not as a
/// variant here.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Incremental text output chunk.
    TextDelta { text: String },
    /// No more text will arrive on this connection.
    TextEnd,
    /// One audio segment, still base64-encoded as received.
    AudioChunk {
        base64_audio: String,
        associated_text: String,
    },
    /// No more audio will arrive on this connection.
    AudioEnd,
    /// Backend status topics (search progress, tool activity, ...).
    StatusUpdate {
        topics: BTreeMap<String, serde_json::Value>,
    },
}

/// One inbound JSON message as both transports put it on the wire.
///
/// Every field is optional; a single message may carry several of them at
/// once (for example a final text delta together with `textEnd`).
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMessage {
    pub text: Option<String>,
    pub text_end: Option<bool>,
    pub audio_end: Option<bool>,
    pub status_topics: Option<BTreeMap<String, serde_json::Value>>,
    /// Base64-encoded audio segment.
    pub audio: Option<String>,
    /// Text the audio segment corresponds to; informational only.
    pub audio_for_text: Option<String>,
}

impl WireMessage {
    /// Parses one raw wire payload.
    pub fn parse(transport: &TransportId, raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw).map_err(|e| {
            TransportError::malformed(transport.clone(), format!("invalid stream message: {e}"))
        })
    }

    /// Expands this message into normalized events.
    ///
    /// Expansion order is fixed so that payload carried alongside end-markers
    /// is processed first: status, text delta, audio chunk, then `textEnd`
    /// and `audioEnd`.
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(topics) = self.status_topics {
            events.push(StreamEvent::StatusUpdate { topics });
        }
        if let Some(text) = self.text {
            events.push(StreamEvent::TextDelta { text });
        }
        if let Some(base64_audio) = self.audio {
            events.push(StreamEvent::AudioChunk {
                base64_audio,
                associated_text: self.audio_for_text.unwrap_or_default(),
            });
        }
        if self.text_end == Some(true) {
            events.push(StreamEvent::TextEnd);
        }
        if self.audio_end == Some(true) {
            events.push(StreamEvent::AudioEnd);
        }
        events
    }
}
