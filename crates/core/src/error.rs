//! Error types for the PromptGate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum: request validation,
//! prompt budgeting, the generation backend, and the stream bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while budgeting and assembling a prompt.
///
/// All of these are returned synchronously, before any generation work
/// is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// The instruction cannot fit, or the request carries nothing to answer.
    #[error(
        "Prompt too large: instruction needs {instruction_tokens} tokens but only {budget} remain"
    )]
    PromptTooLarge {
        instruction_tokens: usize,
        budget: usize,
    },

    /// The prompt fits but too little room remains for generation.
    #[error(
        "Insufficient generation room: {available} new tokens available, at least {required} required"
    )]
    InsufficientGenerationRoom { available: usize, required: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

/// Validation failures when constructing a `GenerationRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("model_max_length must be greater than zero")]
    ZeroModelMaxLength,

    #[error("max_new_tokens_requested must be greater than zero")]
    ZeroMaxNewTokens,

    #[error("{field} must be greater than zero when bounded")]
    ZeroInputCap { field: &'static str },
}

/// Failures reported by a `GenerationBackend`.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend rejected prompt: {0}")]
    InvalidPrompt(String),
}

/// Non-fatal conditions recorded in assembly metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BudgetWarning {
    /// The computed input budget was not positive and was clamped to `floor`.
    BudgetExhausted { computed: i64, floor: usize },
}

impl std::fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExhausted { computed, floor } => write!(
                f,
                "Input budget exhausted ({computed} tokens), degraded to {floor} tokens"
            ),
        }
    }
}

/// Classification of a failed stream, carried by `StreamEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    /// The backend returned an error.
    WorkerFailure,
    /// The backend panicked on the worker thread.
    WorkerPanicked,
}

impl std::fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkerFailure => f.write_str("worker_failure"),
            Self::WorkerPanicked => f.write_str("worker_panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_error_displays_correctly() {
        let err = PromptError::PromptTooLarge {
            instruction_tokens: 900,
            budget: 12,
        };
        assert!(err.to_string().contains("900"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn request_error_converts_into_prompt_error() {
        let err: PromptError = RequestError::ZeroModelMaxLength.into();
        assert!(matches!(err, PromptError::InvalidRequest(_)));
        assert!(err.to_string().contains("model_max_length"));
    }

    #[test]
    fn budget_warning_serialization() {
        let warning = BudgetWarning::BudgetExhausted {
            computed: -412,
            floor: 32,
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains(r#""type":"budget_exhausted""#));
        assert!(warning.to_string().contains("-412"));
    }

    #[test]
    fn stream_error_kind_names() {
        assert_eq!(StreamErrorKind::WorkerFailure.to_string(), "worker_failure");
        assert_eq!(StreamErrorKind::WorkerPanicked.to_string(), "worker_panicked");
    }
}
