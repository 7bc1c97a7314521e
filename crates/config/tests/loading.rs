//! File-based loading tests for promptgate-config.

use std::io::Write;

use promptgate_config::{AppConfig, ConfigError, DocsOrdering, TokenizerKind};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_full_file() {
    let file = write_config(
        r#"
[budget]
system_fraction = 0.8
docs_ordering = "best_near_prompt"
docs_joiner = "\n---\n"

[stream]
max_time_secs = 30.0
poll_interval_ms = 10
channel_capacity = 8

[tokenizer]
kind = "huggingface"
path = "/models/llama/tokenizer.json"
model_max_length = 8192
supports_system_role = false
"#,
    );

    let config = AppConfig::load_from(file.path()).unwrap();
    assert_eq!(config.budget.system_fraction, 0.8);
    assert_eq!(config.budget.docs_ordering, DocsOrdering::BestNearPrompt);
    assert_eq!(config.budget.docs_joiner, "\n---\n");
    assert_eq!(config.stream.channel_capacity, 8);
    assert_eq!(config.tokenizer.kind, TokenizerKind::Huggingface);
    assert_eq!(config.tokenizer.model_max_length, 8192);
    assert!(!config.tokenizer.supports_system_role);
}

#[test]
fn invalid_fraction_in_file_fails_validation() {
    let file = write_config("[budget]\nlanguage_fraction = 1.2\n");
    let err = AppConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("language_fraction"));
}

#[test]
fn malformed_file_reports_parse_error() {
    let file = write_config("[stream\nmax_time_secs = ");
    let err = AppConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn saved_defaults_load_back_identically() {
    let file = write_config(&AppConfig::default_toml());
    let config = AppConfig::load_from(file.path()).unwrap();
    assert_eq!(config, AppConfig::default());
}
