use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _, stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::errors::TransportError;
use crate::event::{StreamEvent, WireMessage};
use crate::request::StreamRequest;
use crate::transport::{TransportAdapter, TransportCloser, TransportConnection, TransportId};

use super::config::EndpointConfig;

/// Transport id of the WebSocket adapter.
pub const WS_TRANSPORT: &str = "websocket";

const DEFAULT_WS_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_CHANNEL: &str = "chat";

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport: bidirectional channel scoped to a named sub-channel.
///
/// On connect it sends one `start` envelope carrying the full request as a
/// structured payload; subsequent inbound text frames carry the same wire
/// JSON shape as the SSE variant. Streams default to a 30 second ceiling.
pub struct WsTransport {
    config: EndpointConfig,
    channel: String,
}

impl WsTransport {
    /// Creates a transport from explicit endpoint configuration.
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }

    /// Creates a transport using `INFERENCE_STREAM_URL`.
    pub fn from_env() -> Result<Self, crate::errors::StreamError> {
        Ok(Self::new(EndpointConfig::from_env()?))
    }

    /// Overrides the sub-channel the stream is scoped to.
    pub fn channel(mut self, name: impl Into<String>) -> Self {
        self.channel = name.into();
        self
    }

    fn stream_url(&self) -> String {
        self.config.joined(&format!("/v1/chat/stream/{}", self.channel))
    }
}

#[async_trait::async_trait]
impl TransportAdapter for WsTransport {
    fn id(&self) -> TransportId {
        TransportId::new(WS_TRANSPORT)
    }

    fn default_deadline(&self) -> Option<Duration> {
        Some(DEFAULT_WS_DEADLINE)
    }

    async fn connect(&self, request: &StreamRequest) -> Result<TransportConnection, TransportError> {
        let transport = self.id();
        let url = self.stream_url();
        debug!(request_id = %request.request_id, channel = %self.channel, "opening WebSocket stream");

        let connected = tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                TransportError::connect(
                    transport.clone(),
                    format!(
                        "WebSocket connect timed out after {:?}",
                        self.config.connect_timeout
                    ),
                    None,
                )
            })?
            .map_err(|e| {
                TransportError::connect(
                    transport.clone(),
                    format!("WebSocket connect failed: {e}"),
                    None,
                )
            })?;
        let (socket, _response) = connected;
        let (mut sink, read) = socket.split();

        let envelope = start_envelope(&transport, request)?;
        sink.send(Message::Text(envelope)).await.map_err(|e| {
            TransportError::connect(
                transport.clone(),
                format!("failed to send start event: {e}"),
                None,
            )
        })?;

        let events = ws_event_stream(transport.clone(), read);
        Ok(TransportConnection {
            events: Box::pin(events),
            closer: Box::new(WsCloser {
                transport,
                sink,
            }),
        })
    }
}

#[derive(serde::Serialize)]
struct StartEnvelope<'a> {
    event: &'a str,
    data: &'a StreamRequest,
}

fn start_envelope(
    transport: &TransportId,
    request: &StreamRequest,
) -> Result<String, TransportError> {
    serde_json::to_string(&StartEnvelope {
        event: "start",
        data: request,
    })
    .map_err(|e| {
        TransportError::connect(
            transport.clone(),
            format!("failed to encode start event: {e}"),
            None,
        )
    })
}

struct WsCloser {
    transport: TransportId,
    sink: SplitSink<WsSocket, Message>,
}

#[async_trait::async_trait]
impl TransportCloser for WsCloser {
    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.send(Message::Close(None)).await.map_err(|e| {
            TransportError::close(
                self.transport.clone(),
                format!("WebSocket close failed: {e}"),
            )
        })?;
        let _ = self.sink.close().await;
        Ok(())
    }
}

fn ws_event_stream(
    transport: TransportId,
    read: SplitStream<WsSocket>,
) -> impl futures::Stream<Item = Result<StreamEvent, TransportError>> + Send {
    struct State {
        transport: TransportId,
        read: SplitStream<WsSocket>,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            transport,
            read,
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

                match state.read.next().await {
                    Some(Ok(Message::Text(raw))) => {
                        if raw.trim().is_empty() {
                            continue;
                        }
                        let message = WireMessage::parse(&state.transport, &raw)?;
                        state.pending.extend(message.into_events());
                    }
                    Some(Ok(Message::Close(_))) => state.done = true,
                    // Binary, ping and pong frames carry nothing for us.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(TransportError::read(
                            state.transport.clone(),
                            format!("WebSocket read failed: {e}"),
                        ));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt as _, StreamExt as _};

    use super::*;

    #[test]
    fn start_envelope_carries_full_request_camel_case() {
        let mut request = StreamRequest::new("hello");
        request.wants_audio = true;
        request.speech_rate = Some(1.25);
        let raw = start_envelope(&TransportId::new(WS_TRANSPORT), &request).expect("envelope");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value.get("event").and_then(|v| v.as_str()), Some("start"));
        let data = value.get("data").expect("data");
        assert_eq!(data.get("prompt").and_then(|v| v.as_str()), Some("hello"));
        assert_eq!(data.get("audio").and_then(|v| v.as_bool()), Some(true));
        assert!(data.get("speechRate").is_some());
        assert!(data.get("requestId").is_none());
    }

    #[tokio::test]
    async fn connects_sends_start_and_yields_events_from_loopback_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("accept ws");

            let first = ws.next().await.expect("start frame").expect("start frame ok");
            let start: serde_json::Value =
                serde_json::from_str(first.to_text().expect("text frame")).expect("start json");
            assert_eq!(start["event"], "start");
            assert_eq!(start["data"]["prompt"], "hi");

            ws.send(Message::Text(r#"{"text":"He"}"#.into()))
                .await
                .expect("send");
            ws.send(Message::Text(r#"{"text":"y","textEnd":true}"#.into()))
                .await
                .expect("send");

            // Drain until the client closes.
            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let transport = WsTransport::new(EndpointConfig::new(format!("ws://{addr}")));
        let mut connection = transport
            .connect(&StreamRequest::new("hi"))
            .await
            .expect("connect");

        let mut events = Vec::new();
        while let Some(event) = connection.events.next().await {
            let event = event.expect("event");
            let is_end = event == StreamEvent::TextEnd;
            events.push(event);
            if is_end {
                break;
            }
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "He".into() },
                StreamEvent::TextDelta { text: "y".into() },
                StreamEvent::TextEnd,
            ]
        );

        drop(connection.events);
        connection.closer.close().await.expect("close");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connect_error() {
        // Port 9 (discard) is almost certainly closed; rely on the connect
        // timeout either way.
        let transport = WsTransport::new(
            EndpointConfig::new("ws://127.0.0.1:9").connect_timeout(Duration::from_millis(200)),
        );
        let err = transport
            .connect(&StreamRequest::new("hi"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
