use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::{StreamError, TransportError};
use crate::event::{StreamEvent, WireMessage};
use crate::request::StreamRequest;
use crate::transport::{
    DropCloser, TransportAdapter, TransportConnection, TransportId,
};

use super::config::EndpointConfig;

/// Transport id of the SSE adapter.
pub const SSE_TRANSPORT: &str = "sse";

const STREAM_PATH: &str = "/v1/chat/stream";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Server-Sent-Events transport: one-way HTTP event stream, request
/// parameters as URL query strings.
///
/// Has no default deadline; the stream is bounded by end-markers or a
/// transport error. Dropping the event stream releases the connection.
pub struct SseTransport {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl SseTransport {
    /// Creates a transport from explicit endpoint configuration.
    pub fn new(config: EndpointConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build SSE client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using `INFERENCE_STREAM_URL`.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(EndpointConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl TransportAdapter for SseTransport {
    fn id(&self) -> TransportId {
        TransportId::new(SSE_TRANSPORT)
    }

    async fn connect(&self, request: &StreamRequest) -> Result<TransportConnection, TransportError> {
        let transport = self.id();
        debug!(request_id = %request.request_id, "opening SSE stream");

        let response = self
            .client
            .get(self.config.joined(STREAM_PATH))
            .query(&request.query_pairs())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| {
                TransportError::connect(transport.clone(), format!("SSE request failed: {e}"), None)
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::connect(
                transport,
                format!("SSE request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        let events = sse_event_stream(transport, bytes_stream);
        Ok(TransportConnection {
            events: Box::pin(events),
            closer: Box::new(DropCloser),
        })
    }
}

/// Incremental SSE frame decoder.
///
/// Buffers raw bytes and yields the `data` payload of each complete frame,
/// tolerating frames split across chunk boundaries and `\r\n` line endings.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((end, delim_len)) = frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(payload) = data_payload(&frame) {
                payloads.push(payload);
            }
        }
        payloads
    }
}

// A frame ends at a blank line.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1] == b'\n' {
                return Some((i, 2));
            }
            if i + 2 < buf.len() && buf[i + 1] == b'\r' && buf[i + 2] == b'\n' {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

/// Joins the frame's `data:` lines; comment and `event:` lines are ignored.
fn data_payload(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            lines.push(rest.trim_start().to_string());
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn sse_event_stream(
    transport: TransportId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<StreamEvent, TransportError>> + Send {
    struct State {
        transport: TransportId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            transport,
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for payload in state.decoder.push_chunk(&chunk) {
                            if payload.trim().is_empty() {
                                continue;
                            }
                            let message = WireMessage::parse(&state.transport, &payload)?;
                            state.pending.extend(message.into_events());
                        }
                    }
                    Some(Err(e)) => {
                        return Err(TransportError::read(
                            state.transport.clone(),
                            format!("SSE read failed: {e}"),
                        ));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}
