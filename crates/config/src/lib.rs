//! Configuration loading, validation, and management for PromptGate.
//!
//! Loads configuration from `~/.promptgate/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The budgeting and streaming crates never read the environment
//! themselves; they receive `BudgetConfig` and `StreamConfig` values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `stream.max_time_secs`.
pub const ENV_MAX_TIME_SECS: &str = "PROMPTGATE_MAX_TIME_SECS";

/// Environment variable pointing at a `tokenizer.json` file.
pub const ENV_TOKENIZER: &str = "PROMPTGATE_TOKENIZER";

/// The root configuration structure.
///
/// Maps directly to `~/.promptgate/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prompt budgeting knobs
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Streaming bridge knobs
    #[serde(default)]
    pub stream: StreamConfig,

    /// Which tokenizer the CLI should measure with
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

/// How selected documents are arranged in the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocsOrdering {
    /// Most relevant first, as given
    #[default]
    BestFirst,
    /// Reversed, so the most relevant document sits next to the instruction
    BestNearPrompt,
    /// Most relevant documents at both ends, least relevant in the middle
    ReverseUcurve,
}

/// Fractions, reserves, and texts used by the section budgeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Share of the initial budget the system prompt may take
    #[serde(default = "default_system_fraction")]
    pub system_fraction: f64,

    /// Share of the post-system budget each language hint may take
    #[serde(default = "default_language_fraction")]
    pub language_fraction: f64,

    /// Share of the post-overhead budget documents may take
    #[serde(default = "default_document_fraction")]
    pub document_fraction: f64,

    /// Tokens set aside for document framing before selection
    #[serde(default = "default_document_overhead_tokens")]
    pub document_overhead_tokens: usize,

    /// Budget used when the computed initial budget is not positive
    #[serde(default = "default_degraded_budget_floor")]
    pub degraded_budget_floor: usize,

    /// Slack subtracted from the generation-room requirement
    #[serde(default = "default_generation_room_fudge")]
    pub generation_room_fudge: usize,

    /// Separator placed after each document
    #[serde(default = "default_docs_joiner")]
    pub docs_joiner: String,

    #[serde(default)]
    pub docs_ordering: DocsOrdering,

    /// User text of the pinned turn that carries the system prompt when the
    /// model has no system role
    #[serde(default = "default_fake_system_user_prompt")]
    pub fake_system_user_prompt: String,
}

fn default_system_fraction() -> f64 {
    0.9
}
fn default_language_fraction() -> f64 {
    0.45
}
fn default_document_fraction() -> f64 {
    0.9
}
fn default_document_overhead_tokens() -> usize {
    32
}
fn default_degraded_budget_floor() -> usize {
    32
}
fn default_generation_room_fudge() -> usize {
    20
}
fn default_docs_joiner() -> String {
    "\n\n".into()
}
fn default_fake_system_user_prompt() -> String {
    "Who are you?".into()
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            system_fraction: default_system_fraction(),
            language_fraction: default_language_fraction(),
            document_fraction: default_document_fraction(),
            document_overhead_tokens: default_document_overhead_tokens(),
            degraded_budget_floor: default_degraded_budget_floor(),
            generation_room_fudge: default_generation_room_fudge(),
            docs_joiner: default_docs_joiner(),
            docs_ordering: DocsOrdering::default(),
            fake_system_user_prompt: default_fake_system_user_prompt(),
        }
    }
}

/// Deadline and channel sizing for the streaming bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Wall-clock limit for one generation, in seconds
    #[serde(default = "default_max_time_secs")]
    pub max_time_secs: f64,

    /// How long the consumer waits on the channel before re-checking the
    /// deadline and cancellation flag
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the worker-to-consumer channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_time_secs() -> f64 {
    600.0
}
fn default_poll_interval_ms() -> u64 {
    25
}
fn default_channel_capacity() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_time_secs: default_max_time_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    /// Convenience constructor used by tests and embedders.
    pub fn with_max_time(max_time: Duration) -> Self {
        Self {
            max_time_secs: max_time.as_secs_f64(),
            ..Self::default()
        }
    }

    pub fn max_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_time_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Tokenizer implementation selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Byte-length estimate, no model files needed
    #[default]
    Heuristic,
    /// A HuggingFace `tokenizer.json`
    Huggingface,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub kind: TokenizerKind,

    /// Path to `tokenizer.json` (required for `huggingface`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Context window assumed for the model
    #[serde(default = "default_model_max_length")]
    pub model_max_length: usize,

    /// Whether the model's chat template has a system role
    #[serde(default = "default_true")]
    pub supports_system_role: bool,
}

fn default_model_max_length() -> usize {
    4096
}
fn default_true() -> bool {
    true
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: TokenizerKind::default(),
            path: None,
            model_max_length: default_model_max_length(),
            supports_system_role: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.promptgate/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `PROMPTGATE_MAX_TIME_SECS`
    /// - `PROMPTGATE_TOKENIZER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_TIME_SECS) {
            let secs: f64 = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                var: ENV_MAX_TIME_SECS,
                reason: format!("'{raw}' is not a number"),
            })?;
            self.stream.max_time_secs = secs;
        }

        if let Some(path) = lookup(ENV_TOKENIZER).filter(|p| !p.is_empty()) {
            self.tokenizer.kind = TokenizerKind::Huggingface;
            self.tokenizer.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".promptgate")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("budget.system_fraction", self.budget.system_fraction),
            ("budget.language_fraction", self.budget.language_fraction),
            ("budget.document_fraction", self.budget.document_fraction),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }

        if !(self.stream.max_time_secs.is_finite() && self.stream.max_time_secs > 0.0) {
            return Err(ConfigError::ValidationError(
                "stream.max_time_secs must be a positive number".into(),
            ));
        }

        if self.stream.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stream.poll_interval_ms must be > 0".into(),
            ));
        }

        if self.stream.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "stream.channel_capacity must be > 0".into(),
            ));
        }

        if self.tokenizer.model_max_length == 0 {
            return Err(ConfigError::ValidationError(
                "tokenizer.model_max_length must be > 0".into(),
            ));
        }

        if self.tokenizer.kind == TokenizerKind::Huggingface && self.tokenizer.path.is_none() {
            return Err(ConfigError::ValidationError(
                "tokenizer.path is required when tokenizer.kind = \"huggingface\"".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config show`).
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in {var}: {reason}")]
    EnvError { var: &'static str, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
