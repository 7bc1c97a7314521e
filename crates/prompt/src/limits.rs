//! Cutoff helpers: input caps, the initial budget, and relaxed generation room.

use promptgate_core::GenerationRequest;

/// The tightest input bound for a request.
///
/// Unbounded caps are ignored; with both unbounded this is `model_max_length`.
pub fn resolve_input_cap(
    model_max_length: usize,
    max_input_tokens: Option<usize>,
    max_total_input_tokens: Option<usize>,
) -> usize {
    [max_input_tokens, max_total_input_tokens]
        .into_iter()
        .flatten()
        .fold(model_max_length, usize::min)
}

/// `min(model_max_length, cap) - min_reserved_new_tokens`, possibly negative.
pub fn initial_budget(request: &GenerationRequest) -> i64 {
    let cap = resolve_input_cap(
        request.model_max_length,
        request.max_input_tokens,
        request.max_total_input_tokens,
    );
    cap as i64 - request.min_reserved_new_tokens as i64
}

/// Room left for generation after a prompt of `prompt_tokens`, never more
/// than was requested.
pub fn relaxed_max_new_tokens(
    prompt_tokens: usize,
    model_max_length: usize,
    requested: usize,
) -> usize {
    model_max_length.saturating_sub(prompt_tokens).min(requested)
}
