//! Build a tokenizer from configuration.

use std::path::PathBuf;

use promptgate_config::{TokenizerConfig, TokenizerKind};
use promptgate_core::{HeuristicTokenizer, TokenizerAdapter};

/// Tokenizer construction failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenizerLoadError {
    #[error("Failed to load tokenizer from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("tokenizer.kind = \"huggingface\" requires a path")]
    MissingPath,

    #[error("HuggingFace tokenizers need the `hf` feature")]
    FeatureDisabled,
}

/// The tokenizer described by `config`.
pub fn tokenizer_from_config(
    config: &TokenizerConfig,
) -> Result<Box<dyn TokenizerAdapter>, TokenizerLoadError> {
    match config.kind {
        TokenizerKind::Heuristic => {
            let tokenizer = HeuristicTokenizer::new(config.model_max_length);
            if config.supports_system_role {
                Ok(Box::new(tokenizer))
            } else {
                Ok(Box::new(tokenizer.without_system_role()))
            }
        }
        TokenizerKind::Huggingface => {
            let path = config.path.as_deref().ok_or(TokenizerLoadError::MissingPath)?;
            load_hf(path, config)
        }
    }
}

#[cfg(feature = "hf")]
fn load_hf(
    path: &std::path::Path,
    config: &TokenizerConfig,
) -> Result<Box<dyn TokenizerAdapter>, TokenizerLoadError> {
    let tokenizer = crate::hf::HfTokenizer::from_file(path, config.model_max_length)?
        .with_system_role(config.supports_system_role);
    tracing::info!(path = %path.display(), "Loaded HuggingFace tokenizer");
    Ok(Box::new(tokenizer))
}

#[cfg(not(feature = "hf"))]
fn load_hf(
    _path: &std::path::Path,
    _config: &TokenizerConfig,
) -> Result<Box<dyn TokenizerAdapter>, TokenizerLoadError> {
    Err(TokenizerLoadError::FeatureDisabled)
}
