//! # PromptGate Prompt
//!
//! Fits a generation request into a model's context window.
//!
//! ```text
//! GenerationRequest
//!   → SectionBudgeter   (system, language hints, instruction, context, aux, documents)
//!   → HistorySelector   (longest history suffix that still fits)
//!   → PromptAssembler   (render, re-tokenize, derive max new tokens)
//!   → AssembledPrompt
//! ```
//!
//! All policy (fractions, reserves, document ordering) comes from
//! [`promptgate_config::BudgetConfig`], passed in explicitly.

pub mod assembler;
pub mod budget;
pub mod documents;
#[cfg(feature = "hf")]
pub mod hf;
pub mod history;
pub mod limits;
pub mod loader;

pub use assembler::{AssembledPrompt, AssemblyMetadata, PromptAssembler, PromptFormat, SectionStats};
pub use budget::{InitialBudget, SectionAllocation, SectionBudgeter, TokenBudget};
pub use documents::{DocumentSelection, order_documents, reverse_ucurve, undo_reverse_ucurve};
#[cfg(feature = "hf")]
pub use hf::HfTokenizer;
pub use history::{HistorySelector, HistoryWindow, linear_scan, smallest_fitting_start};
pub use loader::{TokenizerLoadError, tokenizer_from_config};
