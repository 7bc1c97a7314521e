//! Section budgeter: splits the input budget across the fixed prompt sections.
//!
//! # Allocation order
//!
//! | Section | Share of what remains |
//! |---------|-----------------------|
//! | System | `system_fraction` |
//! | Language pre/post | `language_fraction` each, of the post-system remainder |
//! | Instruction | all |
//! | Context | all |
//! | Aux input | all |
//! | Documents | `document_fraction`, after the overhead reserve |
//!
//! History is fitted afterwards by the history selector, against the
//! initial budget and the full rendering.

use promptgate_config::BudgetConfig;
use promptgate_core::{
    BudgetWarning, GenerationRequest, PromptError, PromptSection, SectionName, TokenizerAdapter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::documents::{self, DocumentSelection};
use crate::limits;

// ── Token budget ──────────────────────────────────────────────────────────

/// Tokens still available to one allocation run. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    remaining: usize,
}

impl TokenBudget {
    pub fn new(tokens: usize) -> Self {
        Self { remaining: tokens }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// `round(remaining * fraction)`, never above what remains.
    pub fn share(&self, fraction: f64) -> usize {
        let share = (self.remaining as f64 * fraction).round();
        (share.max(0.0) as usize).min(self.remaining)
    }

    /// Consume up to `tokens`, returning how many were actually taken.
    pub fn take(&mut self, tokens: usize) -> usize {
        let taken = tokens.min(self.remaining);
        self.remaining -= taken;
        taken
    }
}

/// The starting budget for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialBudget {
    /// Tokens available for the whole input
    pub tokens: usize,

    /// True when the computed budget was not positive and the floor was used
    pub degraded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<BudgetWarning>,
}

impl InitialBudget {
    /// Compute the initial budget, clamping to the degraded floor if needed.
    pub fn for_request(request: &GenerationRequest, config: &BudgetConfig) -> Self {
        let computed = limits::initial_budget(request);
        if computed > 0 {
            return Self {
                tokens: computed as usize,
                degraded: false,
                warning: None,
            };
        }

        // Never more than the model can take, never zero.
        let floor = config
            .degraded_budget_floor
            .min(request.model_max_length)
            .max(1);
        warn!(
            computed,
            floor,
            model_max_length = request.model_max_length,
            min_reserved = request.min_reserved_new_tokens,
            "Input budget exhausted, continuing in degraded mode"
        );
        Self {
            tokens: floor,
            degraded: true,
            warning: Some(BudgetWarning::BudgetExhausted { computed, floor }),
        }
    }
}

// ── Allocation ────────────────────────────────────────────────────────────

/// Sections produced by one budgeting run, in allocation order.
#[derive(Debug, Clone)]
pub struct SectionAllocation {
    pub initial: InitialBudget,

    /// Every non-history section, in allocation order (empty ones included)
    pub sections: Vec<PromptSection>,

    /// Selected documents after ordering
    pub documents: Vec<String>,

    pub document_selection: DocumentSelection,

    /// Tokens actually set aside for document framing
    pub document_overhead: usize,

    /// Budget left after all sections
    pub remaining: usize,
}

impl SectionAllocation {
    pub fn section(&self, name: SectionName) -> Option<&PromptSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Text of a section, empty when absent.
    pub fn text(&self, name: SectionName) -> &str {
        self.section(name).map(|s| s.text.as_str()).unwrap_or("")
    }

    /// Sum of the section token counts.
    pub fn section_tokens(&self) -> usize {
        self.sections.iter().map(|s| s.token_count).sum()
    }
}

/// Allocates the input budget across sections. Stateless; reuse freely.
pub struct SectionBudgeter<'a> {
    tokenizer: &'a dyn TokenizerAdapter,
    config: &'a BudgetConfig,
}

impl<'a> SectionBudgeter<'a> {
    pub fn new(tokenizer: &'a dyn TokenizerAdapter, config: &'a BudgetConfig) -> Self {
        Self { tokenizer, config }
    }

    /// Run the allocation for `request`.
    ///
    /// Fails with `PromptTooLarge` only when a non-empty instruction has no
    /// room left at all.
    pub fn allocate(&self, request: &GenerationRequest) -> Result<SectionAllocation, PromptError> {
        let initial = InitialBudget::for_request(request, self.config);
        let mut budget = TokenBudget::new(initial.tokens);
        let mut sections = Vec::with_capacity(7);

        // ── System prompt ──────────────────────────────────────────────────
        let limit = budget.share(self.config.system_fraction);
        sections.push(self.fit(SectionName::System, &request.system_prompt, limit, &mut budget));

        // ── Language hints (same base for both) ────────────────────────────
        let limit = budget.share(self.config.language_fraction);
        sections.push(self.fit(SectionName::LangPre, &request.lang_pre, limit, &mut budget));
        sections.push(self.fit(SectionName::LangPost, &request.lang_post, limit, &mut budget));

        // ── Instruction ────────────────────────────────────────────────────
        let before = budget.remaining();
        let instruction =
            self.fit(SectionName::Instruction, &request.instruction, before, &mut budget);
        if !request.instruction.is_empty() && instruction.token_count == 0 {
            return Err(PromptError::PromptTooLarge {
                instruction_tokens: self.tokenizer.count_tokens(&request.instruction),
                budget: before,
            });
        }
        sections.push(instruction);

        // ── Context and aux input ──────────────────────────────────────────
        let limit = budget.remaining();
        sections.push(self.fit(SectionName::Context, &request.free_context, limit, &mut budget));
        let limit = budget.remaining();
        sections.push(self.fit(SectionName::AuxInput, &request.aux_input, limit, &mut budget));

        // ── Documents ──────────────────────────────────────────────────────
        let document_overhead = budget.take(self.config.document_overhead_tokens);
        let doc_budget = budget.share(self.config.document_fraction);
        let (selected, document_selection) = documents::select_documents(
            self.tokenizer,
            &request.documents,
            doc_budget,
            &self.config.docs_joiner,
        );
        let ordered = documents::order_documents(&selected, self.config.docs_ordering);
        let doc_text = ordered.join(&self.config.docs_joiner);
        let doc_tokens = self.tokenizer.count_tokens(&doc_text);
        budget.take(doc_tokens);
        debug!(
            section = %SectionName::Documents,
            available = request.documents.len(),
            selected = document_selection.selected_count,
            tokens = doc_tokens,
            budget = doc_budget,
            "Selected documents"
        );
        sections.push(PromptSection::new(SectionName::Documents, doc_text, doc_tokens));

        Ok(SectionAllocation {
            initial,
            sections,
            documents: ordered,
            document_selection,
            document_overhead,
            remaining: budget.remaining(),
        })
    }

    /// Truncate `text` to `limit` tokens and charge the budget for it.
    fn fit(
        &self,
        name: SectionName,
        text: &str,
        limit: usize,
        budget: &mut TokenBudget,
    ) -> PromptSection {
        if text.is_empty() {
            return PromptSection::empty(name);
        }
        let limit = limit.min(budget.remaining());
        let (kept, tokens) = self.tokenizer.truncate_to(text, limit);
        budget.take(tokens);
        debug!(
            section = %name,
            tokens,
            limit,
            truncated = kept.len() < text.len(),
            remaining = budget.remaining(),
            "Allocated section"
        );
        PromptSection::new(name, kept, tokens)
    }
}
