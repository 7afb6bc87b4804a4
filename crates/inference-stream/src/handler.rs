use std::collections::BTreeMap;

use crate::audio::AudioBlob;

/// Consumer-side callback contract for one stream.
///
/// The drive loop awaits every method before polling the next event, so a
/// slow consumer throttles the connection instead of seeing reordered or
/// interleaved callbacks. All methods default to no-ops; implement only what
/// the consumer cares about.
#[async_trait::async_trait]
pub trait StreamHandler: Send {
    /// One incremental text chunk, in arrival order.
    async fn on_text(&mut self, _chunk: &str) {}

    /// Backend status topics. Never affects closure.
    async fn on_status(&mut self, _topics: &BTreeMap<String, serde_json::Value>) {}

    /// One decoded audio segment, in arrival order.
    ///
    /// The next event on the connection is not processed until this returns.
    async fn on_audio_chunk(&mut self, _chunk: AudioBlob) {}

    /// The audio sub-stream has ended.
    async fn on_audio_complete(&mut self) {}

    /// Terminal callback: fires exactly once per stream, during closure,
    /// with the full accumulated text.
    async fn on_complete(&mut self, _full_text: &str) {}
}

/// Handler that ignores every callback; used by `collect_text`.
pub struct NullHandler;

#[async_trait::async_trait]
impl StreamHandler for NullHandler {}
