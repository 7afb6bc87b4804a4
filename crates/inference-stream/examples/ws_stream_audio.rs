use std::sync::Arc;

use inference_stream::prelude::*;
use inference_stream::transports::WsTransport;

/// Prints text deltas and counts decoded audio bytes as they arrive.
#[derive(Default)]
struct AudioTally {
    bytes: usize,
}

#[async_trait::async_trait]
impl StreamHandler for AudioTally {
    async fn on_text(&mut self, chunk: &str) {
        print!("{chunk}");
    }

    async fn on_audio_chunk(&mut self, chunk: AudioBlob) {
        self.bytes += chunk.data.len();
    }

    async fn on_audio_complete(&mut self) {
        eprintln!("audio finished ({} bytes total)", self.bytes);
    }

    async fn on_complete(&mut self, _full_text: &str) {
        println!();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StreamError> {
    let client = StreamClient::builder()
        .register_transport(Arc::new(WsTransport::from_env()?))
        .build()?;

    let stream = client
        .stream("websocket")
        .prompt("Read me a short greeting.")
        .wants_audio(true)
        .speech_rate(1.0)
        .start(AudioTally::default())
        .await?;

    let outcome = stream.finish().await?;
    eprintln!("stream ended: {:?}", outcome.reason);
    Ok(())
}
