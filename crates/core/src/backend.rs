//! GenerationBackend trait, the abstraction over a text-generation engine.
//!
//! A backend receives a fully budgeted prompt and produces text, reporting
//! each fragment through a callback as it is generated. The call is
//! blocking; the stream bridge runs it on a worker thread.
//!
//! Implementations: local inference engines, HTTP clients, test doubles.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A prompt in the shape the backend consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "prompt", rename_all = "snake_case")]
pub enum PromptPayload {
    /// A single flat prompt string
    Text(String),
    /// A role-tagged message list
    Messages(Vec<ChatMessage>),
}

impl PromptPayload {
    /// The payload flattened to one string, for logging and text backends.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Messages(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message of a role-tagged prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Decoding parameters passed through to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum tokens to generate
    pub max_new_tokens: usize,

    /// Temperature (0.0 = greedy)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.75
}

fn default_top_k() -> usize {
    40
}

fn default_repetition_penalty() -> f32 {
    1.07
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            stop: Vec::new(),
            seed: None,
        }
    }
}

impl SamplingParams {
    /// Defaults with a specific generation limit.
    pub fn with_max_new_tokens(max_new_tokens: usize) -> Self {
        Self {
            max_new_tokens,
            ..Self::default()
        }
    }
}

/// The core GenerationBackend trait.
///
/// `generate` blocks until generation ends. It calls `on_chunk` once per
/// fragment, in order; if the callback returns `ControlFlow::Break`, the
/// backend should stop as soon as it can and return what it has. The
/// returned string is the complete generated text.
pub trait GenerationBackend: Send + Sync + 'static {
    /// Human-readable backend name (e.g., "llama-local", "echo")
    fn name(&self) -> &str;

    /// Run generation to completion.
    fn generate(
        &self,
        prompt: &PromptPayload,
        params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<String, BackendError>;
}
