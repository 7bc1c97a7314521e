//! `TokenizerAdapter` over a HuggingFace `tokenizer.json`.

use std::path::Path;

use promptgate_core::TokenizerAdapter;
use tokenizers::Tokenizer;
use tracing::warn;

use crate::loader::TokenizerLoadError;

/// A model tokenizer loaded from a `tokenizer.json` file.
pub struct HfTokenizer {
    inner: Tokenizer,
    model_max_length: usize,
    system_role: bool,
}

impl HfTokenizer {
    pub fn from_file(path: &Path, model_max_length: usize) -> Result<Self, TokenizerLoadError> {
        let inner = Tokenizer::from_file(path).map_err(|e| TokenizerLoadError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            inner,
            model_max_length,
            system_role: true,
        })
    }

    pub fn with_system_role(mut self, supported: bool) -> Self {
        self.system_role = supported;
        self
    }

    /// Byte offsets of each token, or `None` if encoding failed.
    fn offsets(&self, text: &str) -> Option<Vec<(usize, usize)>> {
        match self.inner.encode(text, false) {
            Ok(encoding) => Some(encoding.get_offsets().to_vec()),
            Err(e) => {
                warn!(error = %e, "Tokenizer failed to encode text");
                None
            }
        }
    }
}

impl TokenizerAdapter for HfTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.len(),
            // Fall back to the byte estimate so budgeting can continue.
            Err(e) => {
                warn!(error = %e, "Tokenizer failed to encode text, estimating");
                text.len().div_ceil(4)
            }
        }
    }

    fn truncate_to(&self, text: &str, max_tokens: usize) -> (String, usize) {
        let Some(offsets) = self.offsets(text) else {
            let estimate = promptgate_core::HeuristicTokenizer::new(self.model_max_length);
            return estimate.truncate_to(text, max_tokens);
        };
        if offsets.len() <= max_tokens {
            return (text.to_string(), offsets.len());
        }

        // Re-encoding a prefix can merge differently, so shrink until it fits.
        let mut keep = max_tokens;
        while keep > 0 {
            let mut end = offsets[keep - 1].1.min(text.len());
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            let prefix = &text[..end];
            let count = self.count_tokens(prefix);
            if count <= max_tokens {
                return (prefix.to_string(), count);
            }
            keep -= 1;
        }
        (String::new(), 0)
    }

    fn model_max_length(&self) -> usize {
        self.model_max_length
    }

    fn supports_system_role(&self) -> bool {
        self.system_role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_load_error() {
        let err = HfTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"), 4096)
            .err()
            .unwrap();
        assert!(matches!(err, TokenizerLoadError::Load { .. }));
    }
}
