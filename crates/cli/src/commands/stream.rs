//! `promptgate stream`: assemble a request and stream a reply.
//!
//! There is no model behind this command: [`EchoBackend`] repeats the last
//! line of the prompt word by word, which is enough to watch the bridge's
//! deadline and cancellation behaviour from a terminal.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use promptgate_core::{BackendError, GenerationBackend, PromptPayload, SamplingParams, StreamEvent};
use promptgate_prompt::PromptAssembler;
use promptgate_stream::StreamBridge;

use super::Input;

/// Echoes the prompt's last non-empty line, one word per chunk.
pub struct EchoBackend {
    delay: Duration,
}

impl EchoBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn generate(
        &self,
        prompt: &PromptPayload,
        params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<String, BackendError> {
        let text = match prompt {
            PromptPayload::Text(text) => text.clone(),
            PromptPayload::Messages(messages) => messages
                .last()
                .map(|m| m.content.clone())
                .ok_or_else(|| BackendError::Generation("empty message list".into()))?,
        };
        let line = text
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();

        let mut out = String::new();
        for (i, word) in line.split_whitespace().take(params.max_new_tokens).enumerate() {
            std::thread::sleep(self.delay);
            let chunk = if i == 0 {
                word.to_string()
            } else {
                format!(" {word}")
            };
            if on_chunk(&chunk).is_break() {
                break;
            }
            out.push_str(&chunk);
        }
        Ok(out)
    }
}

pub async fn run(
    config_path: Option<&Path>,
    input: Input,
    max_time: Option<f64>,
    delay_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(secs) = max_time {
        config.stream.max_time_secs = secs;
        config.validate()?;
    }
    let request = super::read_request(&input.request)?;
    let tokenizer = super::tokenizer_for(&config, input.tokenizer.as_deref())?;

    let prompt = PromptAssembler::new(tokenizer.as_ref(), &config.budget)
        .with_format(input.format)
        .assemble(&request)?;
    let params = SamplingParams::with_max_new_tokens(prompt.effective_max_new_tokens);

    let backend = Arc::new(EchoBackend::new(Duration::from_millis(delay_ms)));
    let mut stream = StreamBridge::start(backend, prompt.payload, params, &config.stream);
    tracing::info!(stream_id = %stream.id(), "Streaming reply");

    let cancel = stream.cancel_handle();
    let mut stdout = std::io::stdout();
    loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };
        match event {
            StreamEvent::Chunk { text } => {
                print!("{text}");
                stdout.flush()?;
            }
            terminal => {
                println!();
                eprintln!("{}", serde_json::to_string(&terminal)?);
            }
        }
    }

    let state = stream.finish().await;
    tracing::info!(%state, "Stream ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptgate_config::StreamConfig;
    use promptgate_core::{ChatMessage, StreamState};

    fn collect(
        backend: &EchoBackend,
        prompt: &PromptPayload,
        max_new: usize,
    ) -> (Vec<String>, String) {
        let mut chunks = Vec::new();
        let params = SamplingParams::with_max_new_tokens(max_new);
        let text = backend
            .generate(prompt, &params, &mut |c| {
                chunks.push(c.to_string());
                ControlFlow::Continue(())
            })
            .unwrap();
        (chunks, text)
    }

    #[test]
    fn echoes_last_line_word_by_word() {
        let backend = EchoBackend::new(Duration::ZERO);
        let prompt = PromptPayload::Text("system\n\nWho are you?\n".into());
        let (chunks, text) = collect(&backend, &prompt, 16);
        assert_eq!(chunks, vec!["Who", " are", " you?"]);
        assert_eq!(text, "Who are you?");
    }

    #[test]
    fn respects_max_new_tokens() {
        let backend = EchoBackend::new(Duration::ZERO);
        let prompt = PromptPayload::Text("one two three four".into());
        let (chunks, _) = collect(&backend, &prompt, 2);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn echoes_last_message() {
        let backend = EchoBackend::new(Duration::ZERO);
        let prompt = PromptPayload::Messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("ping pong"),
        ]);
        let (_, text) = collect(&backend, &prompt, 16);
        assert_eq!(text, "ping pong");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_echo_ends_cancelled() {
        let backend = Arc::new(EchoBackend::new(Duration::from_millis(50)));
        let config = StreamConfig {
            poll_interval_ms: 200,
            ..StreamConfig::default()
        };
        let mut stream = StreamBridge::start(
            backend,
            PromptPayload::Text("one two three four five six".into()),
            SamplingParams::default(),
            &config,
        );
        assert!(matches!(stream.next().await, Some(StreamEvent::Chunk { .. })));
        stream.cancel_handle().cancel();

        let transcript = stream.collect().await;
        assert!(matches!(
            transcript.terminal(),
            Some(StreamEvent::Cancelled { .. })
        ));
        assert_eq!(transcript.state, StreamState::Cancelled);
    }

    #[test]
    fn stops_on_break() {
        let backend = EchoBackend::new(Duration::ZERO);
        let prompt = PromptPayload::Text("a b c d".into());
        let mut seen = 0;
        let text = backend
            .generate(&prompt, &SamplingParams::default(), &mut |_| {
                seen += 1;
                if seen == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(text, "a");
    }
}
