pub mod assemble;
pub mod config_cmd;
pub mod stream;

use std::path::{Path, PathBuf};

use promptgate_config::{AppConfig, ConfigError, TokenizerKind};
use promptgate_core::{GenerationRequest, TokenizerAdapter};
use promptgate_prompt::{PromptFormat, tokenizer_from_config};

/// What `assemble` and `stream` read from the command line.
pub struct Input {
    pub request: PathBuf,
    pub tokenizer: Option<PathBuf>,
    pub format: PromptFormat,
}

/// Load the configuration, from `path` when given, with env overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a request file.
pub fn read_request(path: &Path) -> Result<GenerationRequest, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read request {}: {e}", path.display()))?;
    let request: GenerationRequest = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid request {}: {e}", path.display()))?;
    request.validate()?;
    Ok(request)
}

/// The tokenizer for this run; `--tokenizer` wins over the config file.
pub fn tokenizer_for(
    config: &AppConfig,
    override_path: Option<&Path>,
) -> Result<Box<dyn TokenizerAdapter>, Box<dyn std::error::Error>> {
    let mut tokenizer = config.tokenizer.clone();
    if let Some(path) = override_path {
        tokenizer.kind = TokenizerKind::Huggingface;
        tokenizer.path = Some(path.to_path_buf());
    }
    Ok(tokenizer_from_config(&tokenizer)?)
}
