use std::sync::Arc;

use inference_stream::prelude::*;
use inference_stream::transports::{SseTransport, WsTransport};

struct PrintHandler;

#[async_trait::async_trait]
impl StreamHandler for PrintHandler {
    async fn on_text(&mut self, chunk: &str) {
        print!("{chunk}");
    }

    async fn on_complete(&mut self, _full_text: &str) {
        println!();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StreamError> {
    let client = StreamClient::builder()
        .register_transport(Arc::new(SseTransport::from_env()?))
        .register_transport(Arc::new(WsTransport::from_env()?))
        .build()?;

    let stream = client
        .stream("sse")
        .prompt("Stream a greeting.")
        .web_search(false)
        .start(PrintHandler)
        .await?;

    let outcome = stream.finish().await?;
    eprintln!("stream ended: {:?}", outcome.reason);
    Ok(())
}
