//! `promptgate assemble`: budget a request and print the plan.

use std::path::Path;

use promptgate_config::BudgetConfig;
use promptgate_core::{GenerationRequest, PromptError, TokenizerAdapter};
use promptgate_prompt::{PromptAssembler, PromptFormat};
use serde_json::{Value, json};

use super::Input;

pub fn run(
    config_path: Option<&Path>,
    input: Input,
    metadata_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let request = super::read_request(&input.request)?;
    let tokenizer = super::tokenizer_for(&config, input.tokenizer.as_deref())?;

    let plan = plan(
        tokenizer.as_ref(),
        &config.budget,
        &request,
        input.format,
        metadata_only,
    )?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// The JSON document `assemble` prints.
pub fn plan(
    tokenizer: &dyn TokenizerAdapter,
    budget: &BudgetConfig,
    request: &GenerationRequest,
    format: PromptFormat,
    metadata_only: bool,
) -> Result<Value, PromptError> {
    let prompt = PromptAssembler::new(tokenizer, budget)
        .with_format(format)
        .assemble(request)?;

    let mut plan = json!({
        "effective_max_new_tokens": prompt.effective_max_new_tokens,
        "realized_token_count": prompt.realized_token_count,
        "metadata": prompt.metadata,
    });
    if !metadata_only {
        plan["prompt"] = json!(prompt.payload);
    }
    Ok(plan)
}
