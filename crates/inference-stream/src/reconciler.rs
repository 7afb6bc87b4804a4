use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::audio::AudioBlob;
use crate::errors::{StreamError, TransportError};
use crate::event::StreamEvent;
use crate::handler::StreamHandler;
use crate::transport::{TransportConnection, TransportId};

/// Why a stream resolved without a fault.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EndReason {
    /// All requested sub-streams signalled completion.
    Finished,
    /// The deadline ceiling elapsed before the end-markers arrived.
    DeadlineExceeded,
    /// The caller stopped the stream.
    Stopped,
}

/// Terminal result of a stream that did not fault.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamOutcome {
    /// Concatenation of every text delta observed before closure.
    pub text: String,
    pub reason: EndReason,
}

/// Per-request completion tracking for the two sub-streams.
///
/// Owned by exactly one drive loop and discarded after closure; never reused
/// across requests.
#[derive(Debug)]
pub(crate) struct ReconcilerState {
    accumulated_text: String,
    text_ended: bool,
    audio_ended: bool,
    wants_audio: bool,
}

impl ReconcilerState {
    pub(crate) fn new(wants_audio: bool) -> Self {
        Self {
            accumulated_text: String::new(),
            text_ended: false,
            audio_ended: false,
            wants_audio,
        }
    }

    fn append_text(&mut self, delta: &str) {
        self.accumulated_text.push_str(delta);
    }

    /// Closure condition: text is done, and audio is done or was never asked
    /// for.
    fn should_close(&self) -> bool {
        self.text_ended && (!self.wants_audio || self.audio_ended)
    }

    fn take_text(&mut self) -> String {
        std::mem::take(&mut self.accumulated_text)
    }
}

/// Drives one connection to closure.
///
/// Processes events strictly in arrival order, awaiting each handler callback
/// before polling the next event. Returns after the connection has been
/// released and `on_complete` has fired; a transport fault is returned only
/// after that, so error delivery always follows completion.
pub(crate) async fn drive<H: StreamHandler>(
    transport: TransportId,
    request_id: uuid::Uuid,
    wants_audio: bool,
    mut connection: TransportConnection,
    handler: &mut H,
    deadline: Option<Duration>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<StreamOutcome, StreamError> {
    let mut state = ReconcilerState::new(wants_audio);
    let mut deadline_sleep = deadline.map(|d| Box::pin(tokio::time::sleep(d)));
    let mut stop_watch_closed = false;
    let mut delta_seq = 0_u64;

    loop {
        // Resolve the next step before touching the connection so every
        // closure path below can consume it.
        let step = tokio::select! {
            changed = stop_rx.changed(), if !stop_watch_closed => {
                match changed {
                    Ok(()) if *stop_rx.borrow() => Step::Stopped,
                    Ok(()) => continue,
                    Err(_) => {
                        stop_watch_closed = true;
                        continue;
                    }
                }
            }
            _ = maybe_deadline(&mut deadline_sleep) => Step::DeadlineElapsed,
            next = connection.events.next() => Step::Inbound(next),
        };

        match step {
            Step::Stopped => {
                debug!(request_id = %request_id, transport = %transport, "stream stopped by caller");
                let text = release(&transport, request_id, &mut state, connection, handler).await;
                return Ok(StreamOutcome { text, reason: EndReason::Stopped });
            }
            Step::DeadlineElapsed => {
                debug!(request_id = %request_id, transport = %transport, "deadline elapsed, forcing closure");
                let text = release(&transport, request_id, &mut state, connection, handler).await;
                return Ok(StreamOutcome { text, reason: EndReason::DeadlineExceeded });
            }
            Step::Inbound(Some(Ok(event))) => {
                if let Err(err) =
                    apply_event(&transport, request_id, &mut state, handler, event, &mut delta_seq)
                        .await
                {
                    warn!(request_id = %request_id, transport = %transport, error = %err, "malformed event, forcing closure");
                    release(&transport, request_id, &mut state, connection, handler).await;
                    return Err(StreamError::Transport(err));
                }
                if state.should_close() {
                    let text = release(&transport, request_id, &mut state, connection, handler).await;
                    return Ok(StreamOutcome { text, reason: EndReason::Finished });
                }
            }
            Step::Inbound(Some(Err(err))) => {
                warn!(request_id = %request_id, transport = %transport, error = %err, "transport error, forcing closure");
                release(&transport, request_id, &mut state, connection, handler).await;
                return Err(StreamError::Transport(err));
            }
            Step::Inbound(None) => {
                let err = TransportError::read(transport.clone(), "stream ended before completion");
                warn!(request_id = %request_id, transport = %transport, "stream ended before completion, forcing closure");
                release(&transport, request_id, &mut state, connection, handler).await;
                return Err(StreamError::Transport(err));
            }
        }
    }
}

enum Step {
    Stopped,
    DeadlineElapsed,
    Inbound(Option<Result<StreamEvent, TransportError>>),
}

async fn apply_event<H: StreamHandler>(
    transport: &TransportId,
    request_id: uuid::Uuid,
    state: &mut ReconcilerState,
    handler: &mut H,
    event: StreamEvent,
    delta_seq: &mut u64,
) -> Result<(), TransportError> {
    match event {
        StreamEvent::TextDelta { text } => {
            if text.is_empty() {
                return Ok(());
            }
            debug!(request_id = %request_id, transport = %transport, seq = *delta_seq, "text delta");
            *delta_seq = delta_seq.saturating_add(1);
            handler.on_text(&text).await;
            state.append_text(&text);
        }
        StreamEvent::TextEnd => {
            state.text_ended = true;
        }
        StreamEvent::AudioEnd => {
            state.audio_ended = true;
            handler.on_audio_complete().await;
        }
        StreamEvent::StatusUpdate { topics } => {
            handler.on_status(&topics).await;
        }
        StreamEvent::AudioChunk {
            base64_audio,
            associated_text,
        } => {
            let blob = AudioBlob::from_base64(transport, &base64_audio, associated_text)?;
            debug!(request_id = %request_id, transport = %transport, bytes = blob.data.len(), "audio chunk");
            handler.on_audio_chunk(blob).await;
        }
    }
    Ok(())
}

/// Idempotent closure action: release the transport, then fire `on_complete`
/// exactly once.
///
/// Every return path of the drive loop funnels through here, and the loop
/// returns immediately after, so the action cannot run twice for one request.
/// Release failures are logged, never propagated; `on_complete` still fires.
async fn release<H: StreamHandler>(
    transport: &TransportId,
    request_id: uuid::Uuid,
    state: &mut ReconcilerState,
    connection: TransportConnection,
    handler: &mut H,
) -> String {
    let TransportConnection { events, mut closer } = connection;
    drop(events);
    if let Err(err) = closer.close().await {
        warn!(request_id = %request_id, transport = %transport, error = %err, "transport close failed");
    }
    let text = state.take_text();
    handler.on_complete(&text).await;
    debug!(request_id = %request_id, transport = %transport, "stream closed");
    text
}

async fn maybe_deadline(deadline: &mut Option<Pin<Box<tokio::time::Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
