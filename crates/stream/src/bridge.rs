//! Streaming generation bridge.
//!
//! ```text
//! spawn_blocking(worker) ──bounded mpsc──▶ driver task ──bounded mpsc──▶ GenerationStream
//!        ▲                                     │
//!        └──────── cancel flag (AtomicBool) ◀──┘  deadline / cancel / receiver dropped
//! ```
//!
//! The driver polls the worker channel with a short timeout so it can
//! notice the deadline and cancellation between chunks. It emits exactly one
//! terminal event and always joins the worker before it finishes.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use promptgate_config::StreamConfig;
use promptgate_core::{
    BackendError, GenerationBackend, PromptPayload, SamplingParams, StreamErrorKind, StreamEvent,
    StreamState,
};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::transcript::StreamTranscript;
use crate::worker::{self, WorkerMsg};

/// Lower bound on the poll interval so a zero setting cannot busy-spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ── Cancellation ──────────────────────────────────────────────────────────

/// Requests cooperative cancellation of a running stream.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Ask the worker to stop at its next emission.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ── Bridge ────────────────────────────────────────────────────────────────

/// Starts generations and hands back their event streams.
pub struct StreamBridge;

impl StreamBridge {
    /// Start a generation on a blocking worker.
    ///
    /// Must be called from within a tokio runtime. Events arrive on the
    /// returned [`GenerationStream`]; the last one is always terminal.
    pub fn start(
        backend: Arc<dyn GenerationBackend>,
        prompt: PromptPayload,
        params: SamplingParams,
        config: &StreamConfig,
    ) -> GenerationStream {
        let id = Uuid::new_v4();
        let capacity = config.channel_capacity.max(1);
        let (worker_tx, worker_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let cancel = CancelHandle::default();

        let span = info_span!("generation_stream", stream_id = %id, backend = backend.name());
        let worker_flag = Arc::clone(&cancel.flag);
        let worker_span = span.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let _guard = worker_span.enter();
            worker::run(backend, prompt, params, worker_tx, worker_flag)
        });

        let driver = Driver {
            worker_rx,
            events: event_tx,
            cancel: cancel.clone(),
            max_time: config.max_time(),
            poll_interval: config.poll_interval().max(MIN_POLL_INTERVAL),
        };
        let driver = tokio::spawn(driver.run(worker).instrument(span));

        GenerationStream {
            id,
            events: event_rx,
            cancel,
            driver,
        }
    }
}

/// How the consumer loop ended, before the worker is joined.
enum Exit {
    Finished(String),
    ChannelClosed,
    TimedOut,
    Cancelled,
}

struct Driver {
    worker_rx: mpsc::Receiver<WorkerMsg>,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancelHandle,
    max_time: Duration,
    poll_interval: Duration,
}

impl Driver {
    async fn run(mut self, worker: JoinHandle<Result<(), BackendError>>) -> StreamState {
        let started = Instant::now();
        let deadline = started + self.max_time;
        let mut partial = String::new();
        let mut chunks = 0usize;
        debug!(max_time_ms = self.max_time.as_millis() as u64, "Stream running");

        let exit = loop {
            if self.cancel.is_cancelled() || self.events.is_closed() {
                self.cancel.cancel();
                break Exit::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                self.cancel.cancel();
                break Exit::TimedOut;
            }

            let wait = self.poll_interval.min(deadline - now);
            match timeout(wait, self.worker_rx.recv()).await {
                Err(_) => continue,
                Ok(Some(WorkerMsg::Chunk(text))) => {
                    partial.push_str(&text);
                    chunks += 1;
                    if self.events.send(StreamEvent::Chunk { text }).await.is_err() {
                        self.cancel.cancel();
                        break Exit::Cancelled;
                    }
                }
                // A cancel raised while waiting outranks whatever the worker sent.
                Ok(Some(WorkerMsg::Finished(_)) | None) if self.cancel.is_cancelled() => {
                    break Exit::Cancelled;
                }
                Ok(Some(WorkerMsg::Finished(text))) => break Exit::Finished(text),
                Ok(None) => break Exit::ChannelClosed,
            }
        };

        // Wakes a writer blocked on a full channel.
        drop(self.worker_rx);

        let (event, worker) = match exit {
            Exit::Finished(text) => (StreamEvent::Done { text }, Some(worker)),
            Exit::TimedOut => (StreamEvent::TimedOut { partial }, Some(worker)),
            Exit::Cancelled => (StreamEvent::Cancelled { partial }, Some(worker)),
            Exit::ChannelClosed => (failure_event(worker.await), None),
        };
        let state = event.terminal_state().unwrap_or(StreamState::Failed);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &event {
            StreamEvent::Error { kind, message } => {
                warn!(%kind, %message, chunks, elapsed_ms, "Stream failed")
            }
            _ => info!(state = %state, chunks, elapsed_ms, "Stream finished"),
        }
        let _ = self.events.send(event).await;

        // Timeouts and cancels report first, then wait for the worker to stop.
        if let Some(worker) = worker {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Worker ended with an error after termination"),
                Err(e) => debug!(error = %e, "Worker panicked after termination"),
            }
        }
        state
    }
}

/// The error event for a worker that closed its channel without finishing.
fn failure_event(joined: Result<Result<(), BackendError>, JoinError>) -> StreamEvent {
    match joined {
        Ok(Err(e)) => StreamEvent::Error {
            kind: StreamErrorKind::WorkerFailure,
            message: e.to_string(),
        },
        Ok(Ok(())) => StreamEvent::Error {
            kind: StreamErrorKind::WorkerFailure,
            message: "worker exited without a final result".into(),
        },
        Err(e) if e.is_panic() => StreamEvent::Error {
            kind: StreamErrorKind::WorkerPanicked,
            message: panic_message(e.into_panic()),
        },
        Err(e) => StreamEvent::Error {
            kind: StreamErrorKind::WorkerFailure,
            message: e.to_string(),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".into()
    }
}

// ── Consumer handle ───────────────────────────────────────────────────────

/// The caller's end of a running generation.
///
/// Dropping it (or its event receiver) cancels the generation.
pub struct GenerationStream {
    id: Uuid,
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancelHandle,
    driver: JoinHandle<StreamState>,
}

impl GenerationStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Discard remaining events and return how the stream ended.
    pub async fn finish(mut self) -> StreamState {
        while self.events.recv().await.is_some() {}
        join_driver(self.driver).await
    }

    /// Drain every event, in order, along with the final state.
    pub async fn collect(mut self) -> StreamTranscript {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let state = join_driver(self.driver).await;
        StreamTranscript { events, state }
    }

    /// The events as a `tokio_stream::Stream`.
    pub fn into_stream(self) -> ReceiverStream<StreamEvent> {
        ReceiverStream::new(self.events)
    }
}

async fn join_driver(driver: JoinHandle<StreamState>) -> StreamState {
    match driver.await {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "Stream driver task failed");
            StreamState::Failed
        }
    }
}
