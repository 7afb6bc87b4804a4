use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use crate::errors::StreamError;
use crate::handler::{NullHandler, StreamHandler};
use crate::reconciler::{self, StreamOutcome};
use crate::request::StreamRequest;
use crate::transport::{TransportAdapter, TransportId};

pub(crate) struct ClientInner {
    transports: HashMap<TransportId, Arc<dyn TransportAdapter>>,
}

impl ClientInner {
    pub(crate) fn transport(&self, id: &TransportId) -> Option<Arc<dyn TransportAdapter>> {
        self.transports.get(id).cloned()
    }
}

/// Entry point for issuing streaming inference requests.
#[derive(Clone)]
pub struct StreamClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl StreamClient {
    /// Starts a builder for registering transports and creating a client.
    pub fn builder() -> StreamClientBuilder {
        StreamClientBuilder::default()
    }

    /// Starts building a stream on the given transport.
    pub fn stream(&self, transport: impl Into<TransportId>) -> StreamBuilder {
        StreamBuilder::new(self.inner.clone(), transport.into())
    }
}

/// Builder used to register transport adapters before creating a client.
#[derive(Default)]
pub struct StreamClientBuilder {
    transports: Vec<Arc<dyn TransportAdapter>>,
}

impl StreamClientBuilder {
    /// Registers a transport adapter.
    ///
    /// Register one adapter per transport id (for example one `sse` adapter).
    pub fn register_transport(mut self, transport: Arc<dyn TransportAdapter>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Builds the client and validates transport registration (including
    /// duplicates).
    pub fn build(self) -> Result<StreamClient, StreamError> {
        let mut map: HashMap<TransportId, Arc<dyn TransportAdapter>> = HashMap::new();
        let mut seen: HashSet<TransportId> = HashSet::new();
        for transport in self.transports {
            let id = transport.id();
            if !seen.insert(id.clone()) {
                return Err(StreamError::Config(format!(
                    "duplicate transport registration: {id}"
                )));
            }
            map.insert(id, transport);
        }
        Ok(StreamClient {
            inner: Arc::new(ClientInner { transports: map }),
        })
    }
}

/// Builder for configuring and starting a single stream.
///
/// This is the main user-facing API for providing the prompt, flags and
/// sampling parameters before streaming through a handler or collecting the
/// final text.
pub struct StreamBuilder {
    inner: Arc<ClientInner>,
    transport: TransportId,
    request: StreamRequest,
    /// `None`: use the transport default. `Some(None)`: explicitly unbounded.
    deadline: Option<Option<Duration>>,
}

impl StreamBuilder {
    pub(crate) fn new(inner: Arc<ClientInner>, transport: TransportId) -> Self {
        Self {
            inner,
            transport,
            request: StreamRequest::new(""),
            deadline: None,
        }
    }

    /// Sets the prompt text (required).
    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.request.prompt = text.into();
        self
    }

    /// Sets the conversation identifier for multi-turn context.
    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.request.conversation = Some(id.into());
        self
    }

    /// Enables or disables backend web search.
    pub fn web_search(mut self, enabled: bool) -> Self {
        self.request.web_search = enabled;
        self
    }

    /// Enables or disables the backend planning tool.
    pub fn planning(mut self, enabled: bool) -> Self {
        self.request.planning = enabled;
        self
    }

    /// Requests an audio rendition of the response.
    ///
    /// When enabled, closure waits for both the text and audio sub-streams.
    pub fn wants_audio(mut self, enabled: bool) -> Self {
        self.request.wants_audio = enabled;
        self
    }

    /// Enables or disables the multi-agent pipeline.
    pub fn multi_agent(mut self, enabled: bool) -> Self {
        self.request.multi_agent = enabled;
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, value: f32) -> Self {
        self.request.temperature = Some(value);
        self
    }

    /// Sets nucleus sampling top-p.
    pub fn top_p(mut self, value: f32) -> Self {
        self.request.top_p = Some(value);
        self
    }

    /// Sets the frequency penalty.
    pub fn frequency_penalty(mut self, value: f32) -> Self {
        self.request.frequency_penalty = Some(value);
        self
    }

    /// Sets the presence penalty.
    pub fn presence_penalty(mut self, value: f32) -> Self {
        self.request.presence_penalty = Some(value);
        self
    }

    /// Sets the speech rate for the audio rendition.
    pub fn speech_rate(mut self, value: f32) -> Self {
        self.request.speech_rate = Some(value);
        self
    }

    /// Attaches an opaque image reference.
    pub fn image(mut self, reference: impl Into<String>) -> Self {
        self.request.image = Some(reference.into());
        self
    }

    /// Overrides the transport's default stream ceiling.
    pub fn deadline(mut self, ceiling: Duration) -> Self {
        self.deadline = Some(Some(ceiling));
        self
    }

    /// Disables the stream ceiling regardless of the transport default.
    pub fn no_deadline(mut self) -> Self {
        self.deadline = Some(None);
        self
    }

    #[cfg(test)]
    pub(crate) fn request_value(&self) -> &StreamRequest {
        &self.request
    }

    /// Validates the builder state, connects, and starts the drive task.
    ///
    /// The handler receives every callback from the spawned task; the
    /// returned [`ActiveStream`] resolves once the stream has fully closed.
    pub async fn start<H>(self, handler: H) -> Result<ActiveStream, StreamError>
    where
        H: StreamHandler + 'static,
    {
        if self.request.prompt.trim().is_empty() {
            return Err(StreamError::Validation("prompt must not be empty".into()));
        }
        let adapter = self
            .inner
            .transport(&self.transport)
            .ok_or_else(|| StreamError::TransportNotFound {
                transport: self.transport.clone(),
            })?;
        let deadline = self.deadline.unwrap_or_else(|| adapter.default_deadline());

        let connection = adapter.connect(&self.request).await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (final_tx, final_rx) = oneshot::channel();
        let transport = self.transport;
        let request_id = self.request.request_id;
        let wants_audio = self.request.wants_audio;
        let task_transport = transport.clone();
        tokio::spawn(async move {
            let mut handler = handler;
            let result = reconciler::drive(
                task_transport,
                request_id,
                wants_audio,
                connection,
                &mut handler,
                deadline,
                stop_rx,
            )
            .await;
            let _ = final_tx.send(result);
        });

        Ok(ActiveStream {
            request_id,
            transport,
            stop: StopHandle { tx: stop_tx },
            final_rx,
        })
    }

    /// Runs to completion with a no-op handler and returns the final text.
    pub async fn collect_text(self) -> Result<String, StreamError> {
        let stream = self.start(NullHandler).await?;
        Ok(stream.finish().await?.text)
    }
}

/// Handle used to request caller-initiated closure of a running stream.
///
/// Stopping is idempotent: repeated calls and calls after closure are no-ops.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Requests closure. The stream resolves with `EndReason::Stopped` and
    /// whatever text had accumulated.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Streaming handle returned by [`StreamBuilder::start`].
#[derive(Debug)]
pub struct ActiveStream {
    request_id: uuid::Uuid,
    transport: TransportId,
    stop: StopHandle,
    final_rx: oneshot::Receiver<Result<StreamOutcome, StreamError>>,
}

impl ActiveStream {
    /// Returns the request id for this stream.
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Returns a handle that can stop the stream.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Waits for closure and returns the terminal result.
    ///
    /// All handler callbacks, including `on_complete`, have fired by the time
    /// this resolves; a transport fault is reported here after completion.
    pub async fn finish(self) -> Result<StreamOutcome, StreamError> {
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(StreamError::protocol_msg(format!(
                "stream task ended without a result (transport={})",
                self.transport
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;

    use super::*;
    use crate::errors::TransportError;
    use crate::event::StreamEvent;
    use crate::reconciler::EndReason;
    use crate::transport::{DropCloser, EventStream, TransportConnection};

    struct FakeTransport {
        id: TransportId,
        connects: Arc<AtomicUsize>,
        behavior: FakeBehavior,
    }

    enum FakeBehavior {
        Events(Vec<Result<StreamEvent, TransportError>>),
        Pending,
        ConnectError,
    }

    #[async_trait::async_trait]
    impl TransportAdapter for FakeTransport {
        fn id(&self) -> TransportId {
            self.id.clone()
        }

        async fn connect(
            &self,
            _request: &StreamRequest,
        ) -> Result<TransportConnection, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FakeBehavior::Events(events) => Ok(TransportConnection {
                    events: Box::pin(stream::iter(events.clone())),
                    closer: Box::new(DropCloser),
                }),
                FakeBehavior::Pending => {
                    let events: EventStream = Box::pin(stream::pending());
                    Ok(TransportConnection {
                        events,
                        closer: Box::new(DropCloser),
                    })
                }
                FakeBehavior::ConnectError => Err(TransportError::connect(
                    self.id.clone(),
                    "unreachable",
                    None,
                )),
            }
        }
    }

    fn client_with(behavior: FakeBehavior) -> StreamClient {
        StreamClient::builder()
            .register_transport(Arc::new(FakeTransport {
                id: TransportId::new("fake"),
                connects: Arc::new(AtomicUsize::new(0)),
                behavior,
            }))
            .build()
            .expect("build client")
    }

    #[derive(Clone, Default)]
    struct TextRecorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl StreamHandler for TextRecorder {
        async fn on_text(&mut self, chunk: &str) {
            self.log.lock().expect("lock").push(format!("text:{chunk}"));
        }

        async fn on_complete(&mut self, full_text: &str) {
            self.log
                .lock()
                .expect("lock")
                .push(format!("complete:{full_text}"));
        }
    }

    #[test]
    fn build_rejects_duplicate_transport_ids() {
        let result = StreamClient::builder()
            .register_transport(Arc::new(FakeTransport {
                id: TransportId::new("fake"),
                connects: Arc::new(AtomicUsize::new(0)),
                behavior: FakeBehavior::Pending,
            }))
            .register_transport(Arc::new(FakeTransport {
                id: TransportId::new("fake"),
                connects: Arc::new(AtomicUsize::new(0)),
                behavior: FakeBehavior::Pending,
            }))
            .build();
        assert!(
            matches!(result, Err(StreamError::Config(message)) if message.contains("duplicate transport"))
        );
    }

    #[tokio::test]
    async fn start_rejects_blank_prompt() {
        let client = client_with(FakeBehavior::Pending);
        let err = client
            .stream("fake")
            .prompt("   ")
            .start(NullHandler)
            .await
            .expect_err("blank prompt should fail");
        assert!(matches!(err, StreamError::Validation(msg) if msg.contains("prompt")));
    }

    #[tokio::test]
    async fn unknown_transport_is_a_start_time_error() {
        let client = StreamClient::builder().build().expect("build");
        let err = client
            .stream("missing")
            .prompt("hello")
            .start(NullHandler)
            .await
            .expect_err("missing transport");
        assert!(matches!(err, StreamError::TransportNotFound { .. }));
    }

    #[tokio::test]
    async fn connect_failure_surfaces_before_any_callback() {
        let client = client_with(FakeBehavior::ConnectError);
        let err = client
            .stream("fake")
            .prompt("hello")
            .start(NullHandler)
            .await
            .expect_err("connect should fail");
        assert!(matches!(
            err,
            StreamError::Transport(TransportError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn collect_text_returns_accumulated_text() {
        let client = client_with(FakeBehavior::Events(vec![
            Ok(StreamEvent::TextDelta {
                text: "Hello ".into(),
            }),
            Ok(StreamEvent::TextDelta {
                text: "world".into(),
            }),
            Ok(StreamEvent::TextEnd),
        ]));
        let text = client
            .stream("fake")
            .prompt("greet")
            .collect_text()
            .await
            .expect("collect");
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn handler_sees_deltas_then_completion() {
        let client = client_with(FakeBehavior::Events(vec![
            Ok(StreamEvent::TextDelta { text: "a".into() }),
            Ok(StreamEvent::TextDelta { text: "b".into() }),
            Ok(StreamEvent::TextEnd),
        ]));
        let handler = TextRecorder::default();
        let log = handler.log.clone();
        let stream = client
            .stream("fake")
            .prompt("go")
            .start(handler)
            .await
            .expect("start");
        let outcome = stream.finish().await.expect("finish");

        assert_eq!(outcome.text, "ab");
        assert_eq!(outcome.reason, EndReason::Finished);
        assert_eq!(
            log.lock().expect("lock").clone(),
            vec!["text:a", "text:b", "complete:ab"]
        );
    }

    #[tokio::test]
    async fn stop_handle_resolves_stream_as_stopped() {
        let client = client_with(FakeBehavior::Pending);
        let stream = client
            .stream("fake")
            .prompt("hello")
            .start(NullHandler)
            .await
            .expect("start");
        let stop = stream.stop_handle();
        stop.stop();
        // Repeated stop is a no-op.
        stop.stop();
        let outcome = stream.finish().await.expect("finish");
        assert_eq!(outcome.reason, EndReason::Stopped);
        assert_eq!(outcome.text, "");
    }

    #[tokio::test]
    async fn deadline_override_applies_to_any_transport() {
        let client = client_with(FakeBehavior::Pending);
        let stream = client
            .stream("fake")
            .prompt("hello")
            .deadline(Duration::from_millis(30))
            .start(NullHandler)
            .await
            .expect("start");
        let outcome = stream.finish().await.expect("finish");
        assert_eq!(outcome.reason, EndReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn builder_setters_populate_the_request() {
        let client = client_with(FakeBehavior::Pending);
        let builder = client
            .stream("fake")
            .prompt("hello")
            .conversation("conv-1")
            .web_search(true)
            .wants_audio(true)
            .temperature(0.2)
            .speech_rate(1.5)
            .image("img-7");
        let request = builder.request_value();
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.conversation.as_deref(), Some("conv-1"));
        assert!(request.web_search);
        assert!(request.wants_audio);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.speech_rate, Some(1.5));
        assert_eq!(request.image.as_deref(), Some("img-7"));
    }

    #[tokio::test]
    async fn transport_fault_reported_after_completion_callback() {
        let client = client_with(FakeBehavior::Events(vec![
            Ok(StreamEvent::TextDelta {
                text: "part".into(),
            }),
            Err(TransportError::read(TransportId::new("fake"), "reset")),
        ]));
        let handler = TextRecorder::default();
        let log = handler.log.clone();
        let stream = client
            .stream("fake")
            .prompt("go")
            .start(handler)
            .await
            .expect("start");
        let err = stream.finish().await.expect_err("should fault");

        assert!(matches!(
            err,
            StreamError::Transport(TransportError::Read { .. })
        ));
        // Completion was already delivered when the error surfaced.
        assert_eq!(
            log.lock().expect("lock").clone(),
            vec!["text:part", "complete:part"]
        );
    }
}
