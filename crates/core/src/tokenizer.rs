//! TokenizerAdapter trait, the budgeter's only view of a model's tokenizer.
//!
//! Everything the budgeter measures goes through this trait, so token counts
//! always come from the same source the model uses.

use crate::backend::ChatMessage;

/// Token counting, truncation, and chat-template rendering for one model.
pub trait TokenizerAdapter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count_tokens(&self, text: &str) -> usize;

    /// Longest prefix of `text` that encodes to at most `max_tokens` tokens,
    /// along with its token count.
    ///
    /// Implementations must be idempotent: truncating an already truncated
    /// text to the same limit returns it unchanged.
    fn truncate_to(&self, text: &str, max_tokens: usize) -> (String, usize);

    /// Context window of the model this tokenizer belongs to.
    fn model_max_length(&self) -> usize;

    /// Whether the model's chat template accepts a `system` role.
    fn supports_system_role(&self) -> bool {
        true
    }

    /// Render a message list the way the model's chat template would.
    fn apply_chat_template(&self, messages: &[ChatMessage]) -> String {
        let mut out = String::new();
        for message in messages {
            out.push_str("<|");
            out.push_str(&message.role.to_string());
            out.push_str("|>\n");
            out.push_str(&message.content);
            out.push('\n');
        }
        out.push_str("<|assistant|>\n");
        out
    }
}

/// Bytes per token assumed by [`HeuristicTokenizer`].
const BYTES_PER_TOKEN: usize = 4;

/// A tokenizer that estimates one token per four bytes.
///
/// Used when no model tokenizer is configured, and in tests. Counts are
/// deterministic and monotone in text length.
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    model_max_length: usize,
    system_role: bool,
}

impl HeuristicTokenizer {
    pub fn new(model_max_length: usize) -> Self {
        Self {
            model_max_length,
            system_role: true,
        }
    }

    /// Pretend the model has no system role in its chat template.
    pub fn without_system_role(mut self) -> Self {
        self.system_role = false;
        self
    }
}

impl TokenizerAdapter for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(BYTES_PER_TOKEN)
    }

    fn truncate_to(&self, text: &str, max_tokens: usize) -> (String, usize) {
        let count = self.count_tokens(text);
        if count <= max_tokens {
            return (text.to_string(), count);
        }

        let mut end = max_tokens.saturating_mul(BYTES_PER_TOKEN).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let kept = &text[..end];
        (kept.to_string(), self.count_tokens(kept))
    }

    fn model_max_length(&self) -> usize {
        self.model_max_length
    }

    fn supports_system_role(&self) -> bool {
        self.system_role
    }
}
