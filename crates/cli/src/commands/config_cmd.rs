//! `promptgate config`: configuration management commands.

use std::path::Path;

use promptgate_config::{AppConfig, TokenizerKind};

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Tokenizer:  {}", describe_tokenizer(&config));
    println!("   Max time:   {}s", config.stream.max_time_secs);
    println!("   Documents:  {:?}", config.budget.docs_ordering);
    Ok(())
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)
        .map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml());
    Ok(())
}

pub fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    println!("{}", path.display());
    Ok(())
}

/// Settings that load fine but are probably not what the user meant.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let budget = &config.budget;

    if budget.degraded_budget_floor > config.tokenizer.model_max_length {
        warnings.push(format!(
            "budget.degraded_budget_floor ({}) exceeds tokenizer.model_max_length ({})",
            budget.degraded_budget_floor, config.tokenizer.model_max_length
        ));
    }
    if budget.document_overhead_tokens >= config.tokenizer.model_max_length {
        warnings.push("budget.document_overhead_tokens leaves no room for documents".into());
    }
    if config.stream.poll_interval() >= config.stream.max_time() {
        warnings.push("stream.poll_interval_ms is not shorter than stream.max_time_secs".into());
    }
    if budget.fake_system_user_prompt.trim().is_empty() {
        warnings.push("budget.fake_system_user_prompt is empty".into());
    }
    warnings
}

fn describe_tokenizer(config: &AppConfig) -> String {
    match (&config.tokenizer.kind, &config.tokenizer.path) {
        (TokenizerKind::Huggingface, Some(path)) => format!("huggingface ({})", path.display()),
        (kind, _) => format!(
            "{kind:?} (model_max_length {})",
            config.tokenizer.model_max_length
        ),
    }
}
