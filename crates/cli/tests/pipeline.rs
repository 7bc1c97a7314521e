//! End-to-end tests across the workspace: request → assembly → streaming.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use promptgate_config::{AppConfig, StreamConfig};
use promptgate_core::{
    BackendError, ChatTurn, GenerationBackend, GenerationRequest, HeuristicTokenizer,
    PromptPayload, SamplingParams, StreamEvent, StreamState,
};
use promptgate_prompt::{PromptAssembler, PromptFormat};
use promptgate_stream::StreamBridge;

// ── Recording backend ─────────────────────────────────────────────────────

/// Streams a fixed reply and remembers what it was asked to do.
struct Recording {
    reply: Vec<&'static str>,
    delay: Duration,
    seen: Mutex<Option<(PromptPayload, usize)>>,
}

impl Recording {
    fn new(reply: Vec<&'static str>, delay: Duration) -> Self {
        Self {
            reply,
            delay,
            seen: Mutex::new(None),
        }
    }
}

impl GenerationBackend for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn generate(
        &self,
        prompt: &PromptPayload,
        params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<String, BackendError> {
        *self.seen.lock().unwrap() = Some((prompt.clone(), params.max_new_tokens));
        let mut out = String::new();
        for piece in self.reply.iter().take(params.max_new_tokens) {
            std::thread::sleep(self.delay);
            if on_chunk(piece).is_break() {
                break;
            }
            out.push_str(piece);
        }
        Ok(out)
    }
}

fn long_history(n: usize) -> Vec<ChatTurn> {
    (0..n)
        .map(|i| ChatTurn::new(format!("question {i:03}"), format!("answer {i:03}")))
        .collect()
}

fn request() -> GenerationRequest {
    GenerationRequest::builder("Who are you?", 4096)
        .system_prompt("You are a helpful assistant.")
        .chat_history(long_history(500))
        .min_reserved_new_tokens(512)
        .max_new_tokens(1024)
        .build()
        .unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn assembled_prompt_streams_to_completion() {
    let config = AppConfig::default();
    let tokenizer = HeuristicTokenizer::new(4096);
    let prompt = PromptAssembler::new(&tokenizer, &config.budget)
        .with_format(PromptFormat::ChatTemplate)
        .assemble(&request())
        .unwrap();

    assert!(prompt.realized_token_count <= 4096 - 512);
    assert!(prompt.effective_max_new_tokens >= 512);
    assert!(prompt.metadata.history_dropped > 0);

    let backend = Arc::new(Recording::new(
        vec!["I am ", "a helpful ", "assistant."],
        Duration::from_millis(1),
    ));
    let params = SamplingParams::with_max_new_tokens(prompt.effective_max_new_tokens);
    let stream = StreamBridge::start(
        backend.clone(),
        prompt.payload.clone(),
        params,
        &config.stream,
    );
    let transcript = stream.collect().await;

    assert_eq!(transcript.state, StreamState::Completed);
    assert!(transcript.is_well_formed());
    assert_eq!(transcript.streamed_text(), "I am a helpful assistant.");

    let (seen_prompt, seen_max_new) = backend.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen_prompt, prompt.payload);
    assert_eq!(seen_max_new, prompt.effective_max_new_tokens);
}

#[test]
fn plain_prompt_keeps_newest_history() {
    let config = AppConfig::default();
    let tokenizer = HeuristicTokenizer::new(4096);
    let prompt = PromptAssembler::new(&tokenizer, &config.budget)
        .assemble(&request())
        .unwrap();

    let text = prompt.text().unwrap();
    assert!(text.contains("question 499"));
    assert!(!text.contains("question 000"));
    // History sits between the system prompt and the question.
    assert!(text.starts_with("You are a helpful assistant.\n\n<human>: "));
    assert!(text.ends_with("<bot>: answer 499\n\nWho are you?"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_backend_times_out_after_assembly() {
    let config = AppConfig::default();
    let tokenizer = HeuristicTokenizer::new(4096);
    let prompt = PromptAssembler::new(&tokenizer, &config.budget)
        .assemble(&request())
        .unwrap();

    let backend = Arc::new(Recording::new(
        vec!["slow ", "slower ", "slowest "],
        Duration::from_millis(300),
    ));
    let stream_config = StreamConfig {
        poll_interval_ms: 10,
        ..StreamConfig::with_max_time(Duration::from_millis(450))
    };
    let stream = StreamBridge::start(
        backend,
        prompt.payload,
        SamplingParams::with_max_new_tokens(prompt.effective_max_new_tokens),
        &stream_config,
    );
    let transcript = stream.collect().await;

    assert_eq!(transcript.state, StreamState::TimedOut);
    assert_eq!(transcript.chunk_count(), 1);
    assert_eq!(
        transcript.terminal(),
        Some(&StreamEvent::TimedOut {
            partial: "slow ".into()
        })
    );
}
