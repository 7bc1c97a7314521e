//! The blocking side of the bridge: runs the backend and feeds the channel.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use promptgate_core::{BackendError, GenerationBackend, PromptPayload, SamplingParams};
use tokio::sync::mpsc;
use tracing::debug;

/// What the worker pushes to the consumer.
#[derive(Debug)]
pub(crate) enum WorkerMsg {
    Chunk(String),
    /// Sent once, after the last chunk, when the backend returned `Ok`
    Finished(String),
}

/// Run one generation on the current (blocking) thread.
///
/// Stops emitting as soon as `cancel` is set or the consumer has gone away.
/// `Finished` is only sent for a generation that ran to completion: a
/// stopped backend returns its partial text, which must not read as a
/// final answer. A backend error is returned rather than sent, so the
/// channel closes without a `Finished` sentinel and the consumer recovers
/// it from the join handle.
pub(crate) fn run(
    backend: Arc<dyn GenerationBackend>,
    prompt: PromptPayload,
    params: SamplingParams,
    tx: mpsc::Sender<WorkerMsg>,
    cancel: Arc<AtomicBool>,
) -> Result<(), BackendError> {
    let mut stopped = false;
    let mut on_chunk = |chunk: &str| {
        if cancel.load(Ordering::Acquire) {
            stopped = true;
            return ControlFlow::Break(());
        }
        match tx.blocking_send(WorkerMsg::Chunk(chunk.to_string())) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                stopped = true;
                ControlFlow::Break(())
            }
        }
    };

    let text = backend.generate(&prompt, &params, &mut on_chunk)?;

    if stopped || cancel.load(Ordering::Acquire) {
        debug!(partial_len = text.len(), "Generation stopped early, no final result");
        return Ok(());
    }
    // The consumer may already be gone (timeout, cancel); nothing to report then.
    let _ = tx.blocking_send(WorkerMsg::Finished(text));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting;

    impl GenerationBackend for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn generate(
            &self,
            _prompt: &PromptPayload,
            _params: &SamplingParams,
            on_chunk: &mut dyn FnMut(&str) -> ControlFlow<()>,
        ) -> Result<String, BackendError> {
            let mut out = String::new();
            for i in 0..5 {
                let piece = i.to_string();
                if on_chunk(&piece).is_break() {
                    break;
                }
                out.push_str(&piece);
            }
            Ok(out)
        }
    }

    #[test]
    fn chunks_then_sentinel() {
        let (tx, mut rx) = mpsc::channel(16);
        run(
            Arc::new(Counting),
            PromptPayload::Text("go".into()),
            SamplingParams::default(),
            tx,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        let mut chunks = Vec::new();
        let mut finished = None;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                WorkerMsg::Chunk(c) => chunks.push(c),
                WorkerMsg::Finished(text) => finished = Some(text),
            }
        }
        assert_eq!(chunks, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(finished.as_deref(), Some("01234"));
    }

    #[test]
    fn cancelled_worker_emits_nothing() {
        let (tx, mut rx) = mpsc::channel(16);
        run(
            Arc::new(Counting),
            PromptPayload::Text("go".into()),
            SamplingParams::default(),
            tx,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert!(rx.try_recv().is_err());
    }

    /// Cancels itself after two chunks, then returns the partial text.
    struct CancelsMidway(Arc<AtomicBool>);

    impl GenerationBackend for CancelsMidway {
        fn name(&self) -> &str {
            "cancels-midway"
        }

        fn generate(
            &self,
            _prompt: &PromptPayload,
            _params: &SamplingParams,
            on_chunk: &mut dyn FnMut(&str) -> ControlFlow<()>,
        ) -> Result<String, BackendError> {
            let mut out = String::new();
            for i in 0..5 {
                if i == 2 {
                    self.0.store(true, Ordering::Release);
                }
                let piece = i.to_string();
                if on_chunk(&piece).is_break() {
                    break;
                }
                out.push_str(&piece);
            }
            Ok(out)
        }
    }

    #[test]
    fn stopped_generation_sends_no_final_result() {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(16);
        run(
            Arc::new(CancelsMidway(Arc::clone(&cancel))),
            PromptPayload::Text("go".into()),
            SamplingParams::default(),
            tx,
            cancel,
        )
        .unwrap();

        let mut chunks = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                WorkerMsg::Chunk(c) => chunks.push(c),
                WorkerMsg::Finished(text) => panic!("unexpected final result {text:?}"),
            }
        }
        assert_eq!(chunks, vec!["0", "1"]);
    }

    #[test]
    fn closed_channel_stops_worker() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let result = run(
            Arc::new(Counting),
            PromptPayload::Text("go".into()),
            SamplingParams::default(),
            tx,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(result.is_ok());
    }
}
