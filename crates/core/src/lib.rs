//! # PromptGate Core
//!
//! Domain types, traits, and error definitions for the PromptGate prompt
//! budgeting and response streaming runtime.
//! This crate does no I/O and needs no async runtime. It defines the domain model
//! that the budgeting and streaming crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here:
//! - [`TokenizerAdapter`]: token counting, truncation, chat templates
//! - [`GenerationBackend`]: the blocking, chunk-emitting generation call
//!
//! Implementations live elsewhere (or in the caller), so the budgeter never
//! knows which backend will consume its output.

pub mod backend;
pub mod error;
pub mod event;
pub mod request;
pub mod section;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use backend::{ChatMessage, GenerationBackend, PromptPayload, Role, SamplingParams};
pub use error::{BackendError, BudgetWarning, PromptError, RequestError, StreamErrorKind};
pub use event::{StreamEvent, StreamState};
pub use request::{ChatTurn, GenerationRequest, GenerationRequestBuilder};
pub use section::{PromptSection, SectionName};
pub use tokenizer::{HeuristicTokenizer, TokenizerAdapter};
