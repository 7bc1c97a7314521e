//! Named prompt sections produced by the budgeter.

use serde::{Deserialize, Serialize};

/// The sections of a prompt, listed in allocation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    System,
    LangPre,
    LangPost,
    Instruction,
    Context,
    AuxInput,
    Documents,
    History,
}

impl SectionName {
    /// Allocation order. Earlier sections are budgeted first.
    pub const ALLOCATION_ORDER: [SectionName; 8] = [
        SectionName::System,
        SectionName::LangPre,
        SectionName::LangPost,
        SectionName::Instruction,
        SectionName::Context,
        SectionName::AuxInput,
        SectionName::Documents,
        SectionName::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::LangPre => "lang_pre",
            Self::LangPost => "lang_post",
            Self::Instruction => "instruction",
            Self::Context => "context",
            Self::AuxInput => "aux_input",
            Self::Documents => "documents",
            Self::History => "history",
        }
    }
}

impl std::fmt::Display for SectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently truncated piece of the prompt.
///
/// Invariant: `token_count` is the tokenizer's count of `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSection {
    pub name: SectionName,
    pub text: String,
    pub token_count: usize,
}

impl PromptSection {
    pub fn new(name: SectionName, text: impl Into<String>, token_count: usize) -> Self {
        Self {
            name,
            text: text.into(),
            token_count,
        }
    }

    pub fn empty(name: SectionName) -> Self {
        Self::new(name, String::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
