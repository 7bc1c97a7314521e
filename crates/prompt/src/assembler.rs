//! Prompt assembly: budgeted sections plus the history window, rendered
//! into the final payload and re-measured.
//!
//! The realized token count always comes from tokenizing the final
//! rendering, never from summing per-section counts, since truncation at
//! section boundaries is approximate.

use promptgate_config::BudgetConfig;
use promptgate_core::{
    BudgetWarning, ChatMessage, ChatTurn, GenerationRequest, PromptError, PromptPayload,
    PromptSection, SectionName, TokenizerAdapter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::budget::{SectionAllocation, SectionBudgeter};
use crate::documents::DocumentSelection;
use crate::history::{HistorySelector, HistoryWindow};
use crate::limits;

/// Separator between sections in plain-text prompts.
const SECTION_SEPARATOR: &str = "\n\n";

/// Order of the plain-text rendering. History precedes the question so the
/// prompt ends with what the model should answer, as in message mode.
const PLAIN_ORDER: [SectionName; 8] = [
    SectionName::System,
    SectionName::History,
    SectionName::LangPre,
    SectionName::Context,
    SectionName::AuxInput,
    SectionName::Documents,
    SectionName::Instruction,
    SectionName::LangPost,
];

// ── Types ─────────────────────────────────────────────────────────────────

/// Shape of the assembled prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    /// One flat string: system, history, then the question and its material
    #[default]
    Plain,
    /// A role-tagged message list measured through the chat template
    ChatTemplate,
}

/// The final prompt, ready for a generation backend.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub payload: PromptPayload,

    /// Tokens in the final rendering
    pub realized_token_count: usize,

    /// Generation limit to pass to the backend
    pub effective_max_new_tokens: usize,

    /// All sections including history, in allocation order
    pub sections: Vec<PromptSection>,

    pub metadata: AssemblyMetadata,
}

impl AssembledPrompt {
    /// The prompt text for plain payloads.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            PromptPayload::Text(text) => Some(text),
            PromptPayload::Messages(_) => None,
        }
    }
}

/// What happened during assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub format: PromptFormat,

    /// Input budget the request started with
    pub initial_budget: usize,

    /// Whether the degraded floor was used
    pub degraded: bool,

    /// Per-section statistics
    pub sections: Vec<SectionStats>,

    /// Real history turns kept
    pub history_kept: usize,

    /// Real history turns dropped (oldest first)
    pub history_dropped: usize,

    /// Whether the system prompt travels as a pinned history turn
    pub system_in_history: bool,

    pub documents: DocumentSelection,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BudgetWarning>,

    /// Sum of per-section token counts
    pub estimated_token_count: usize,

    /// Tokens in the final rendering
    pub realized_token_count: usize,
}

/// Statistics for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStats {
    pub name: SectionName,
    pub tokens: usize,
    /// Whether the section lost any content to the budget
    pub truncated: bool,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Builds prompts for one tokenizer. Stateless; reuse across requests.
pub struct PromptAssembler<'a> {
    tokenizer: &'a dyn TokenizerAdapter,
    config: &'a BudgetConfig,
    format: PromptFormat,
}

impl<'a> PromptAssembler<'a> {
    /// Create a plain-text assembler.
    pub fn new(tokenizer: &'a dyn TokenizerAdapter, config: &'a BudgetConfig) -> Self {
        Self {
            tokenizer,
            config,
            format: PromptFormat::Plain,
        }
    }

    pub fn with_format(mut self, format: PromptFormat) -> Self {
        self.format = format;
        self
    }

    /// Budget, window, render, and verify one request.
    ///
    /// # Algorithm
    ///
    /// 1. Allocate the fixed sections (system through documents)
    /// 2. Binary-search the longest history suffix whose full rendering fits
    ///    the initial budget
    /// 3. Render the payload and re-tokenize it
    /// 4. Derive the generation limit and check it against the reserve
    pub fn assemble(&self, request: &GenerationRequest) -> Result<AssembledPrompt, PromptError> {
        request.validate()?;

        let allocation = SectionBudgeter::new(self.tokenizer, self.config).allocate(request)?;
        let limit = allocation.initial.tokens;

        // ── History window ─────────────────────────────────────────────────
        let selector = HistorySelector::with_pinned(self.pinned_turn(&allocation));
        let window = selector.select(&request.chat_history, |turns| {
            self.tokenizer.count_tokens(&self.render(&allocation, turns).1) <= limit
        });
        debug!(
            kept = window.real_turns().len(),
            dropped = window.dropped_count,
            pinned = window.pinned,
            limit,
            "Selected history window"
        );

        if self.nothing_to_answer(&allocation, &window) {
            return Err(PromptError::PromptTooLarge {
                instruction_tokens: 0,
                budget: limit,
            });
        }

        // ── Render and verify ──────────────────────────────────────────────
        let (payload, rendered) = self.render(&allocation, &window.turns);
        let realized = self.tokenizer.count_tokens(&rendered);
        let effective = limits::relaxed_max_new_tokens(
            realized,
            request.model_max_length,
            request.max_new_tokens_requested,
        )
        .max(1);

        let required = if allocation.initial.degraded {
            1
        } else {
            request
                .min_reserved_new_tokens
                .min(request.max_new_tokens_requested)
                .saturating_sub(self.config.generation_room_fudge)
                .max(1)
        };
        if effective < required {
            return Err(PromptError::InsufficientGenerationRoom {
                available: effective,
                required,
            });
        }

        let history_text = render_turns(window.real_turns());
        let history_tokens = self.tokenizer.count_tokens(&history_text);
        let mut sections = allocation.sections.clone();
        sections.push(PromptSection::new(
            SectionName::History,
            history_text,
            history_tokens,
        ));

        let metadata = AssemblyMetadata {
            format: self.format,
            initial_budget: limit,
            degraded: allocation.initial.degraded,
            sections: section_stats(request, &allocation, &sections, &window),
            history_kept: window.real_turns().len(),
            history_dropped: window.dropped_count,
            system_in_history: window.pinned,
            documents: allocation.document_selection.clone(),
            warnings: allocation.initial.warning.iter().cloned().collect(),
            estimated_token_count: sections.iter().map(|s| s.token_count).sum(),
            realized_token_count: realized,
        };

        info!(
            format = ?self.format,
            realized_tokens = realized,
            estimated_tokens = metadata.estimated_token_count,
            effective_max_new_tokens = effective,
            history_kept = metadata.history_kept,
            history_dropped = metadata.history_dropped,
            documents = metadata.documents.selected_count,
            degraded = metadata.degraded,
            "Assembled prompt"
        );

        Ok(AssembledPrompt {
            payload,
            realized_token_count: realized,
            effective_max_new_tokens: effective,
            sections,
            metadata,
        })
    }

    /// The turn carrying the system prompt when the template has no system role.
    fn pinned_turn(&self, allocation: &SectionAllocation) -> Option<ChatTurn> {
        let system = allocation.text(SectionName::System);
        let needs_pin = self.format == PromptFormat::ChatTemplate
            && !self.tokenizer.supports_system_role()
            && !system.is_empty();
        needs_pin.then(|| ChatTurn::new(self.config.fake_system_user_prompt.clone(), system))
    }

    /// An empty instruction is only acceptable if something else carries the request.
    fn nothing_to_answer(&self, allocation: &SectionAllocation, window: &HistoryWindow) -> bool {
        [
            SectionName::Instruction,
            SectionName::Context,
            SectionName::AuxInput,
            SectionName::Documents,
        ]
        .iter()
        .all(|name| allocation.text(*name).is_empty())
            && window.real_turns().is_empty()
    }

    /// Render the payload with the given history, returning it with the
    /// exact text the tokenizer should measure.
    fn render(&self, allocation: &SectionAllocation, turns: &[ChatTurn]) -> (PromptPayload, String) {
        match self.format {
            PromptFormat::Plain => {
                let history = render_turns(turns);
                let text = PLAIN_ORDER
                    .iter()
                    .map(|name| match name {
                        SectionName::History => history.as_str(),
                        other => allocation.text(*other),
                    })
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(SECTION_SEPARATOR);
                (PromptPayload::Text(text.clone()), text)
            }
            PromptFormat::ChatTemplate => {
                let messages = self.build_messages(allocation, turns);
                let rendered = self.tokenizer.apply_chat_template(&messages);
                (PromptPayload::Messages(messages), rendered)
            }
        }
    }

    fn build_messages(&self, allocation: &SectionAllocation, turns: &[ChatTurn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(turns.len() * 2 + 2);

        let system = allocation.text(SectionName::System);
        if self.tokenizer.supports_system_role() && !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }

        for turn in turns {
            messages.push(ChatMessage::user(turn.user_text.as_str()));
            messages.push(ChatMessage::assistant(turn.bot()));
        }

        let user = [
            SectionName::LangPre,
            SectionName::Context,
            SectionName::AuxInput,
            SectionName::Documents,
            SectionName::Instruction,
            SectionName::LangPost,
        ]
        .iter()
        .map(|name| allocation.text(*name))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);
        if !user.is_empty() {
            messages.push(ChatMessage::user(user));
        }

        messages
    }
}

/// Plain-text rendering of history turns.
pub fn render_turns(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("<human>: {}\n<bot>: {}", turn.user_text, turn.bot()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn section_stats(
    request: &GenerationRequest,
    allocation: &SectionAllocation,
    sections: &[PromptSection],
    window: &HistoryWindow,
) -> Vec<SectionStats> {
    sections
        .iter()
        .map(|section| {
            let truncated = match section.name {
                SectionName::System => section.text.len() < request.system_prompt.len(),
                SectionName::LangPre => section.text.len() < request.lang_pre.len(),
                SectionName::LangPost => section.text.len() < request.lang_post.len(),
                SectionName::Instruction => section.text.len() < request.instruction.len(),
                SectionName::Context => section.text.len() < request.free_context.len(),
                SectionName::AuxInput => section.text.len() < request.aux_input.len(),
                SectionName::Documents => {
                    let docs = &allocation.document_selection;
                    docs.dropped_count() > 0 || docs.single_document_truncation_length.is_some()
                }
                SectionName::History => window.dropped_count > 0,
            };
            SectionStats {
                name: section.name,
                tokens: section.token_count,
                truncated,
            }
        })
        .collect()
}
