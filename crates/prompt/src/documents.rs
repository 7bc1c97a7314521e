//! Document selection and ordering.
//!
//! Documents arrive most relevant first. Selection keeps the longest prefix
//! that fits the document budget; ordering then decides where the most
//! relevant ones sit in the prompt.

use promptgate_config::DocsOrdering;
use promptgate_core::TokenizerAdapter;
use serde::{Deserialize, Serialize};

/// Outcome of fitting documents into their budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSelection {
    /// Documents offered
    pub available_count: usize,

    /// Documents kept (whole, or one truncated)
    pub selected_count: usize,

    /// Set when not even the first document fit whole: how many characters
    /// of it were kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_document_truncation_length: Option<usize>,

    /// Tokens the kept documents were measured at, joiners included
    pub token_count: usize,
}

impl DocumentSelection {
    pub fn dropped_count(&self) -> usize {
        self.available_count - self.selected_count
    }
}

/// Keep the longest prefix of `documents` whose cumulative
/// `count_tokens(doc + joiner)` fits in `budget`.
///
/// If the first document alone does not fit, it is truncated to `budget`
/// and its kept length in characters is reported.
pub fn select_documents(
    tokenizer: &dyn TokenizerAdapter,
    documents: &[String],
    budget: usize,
    joiner: &str,
) -> (Vec<String>, DocumentSelection) {
    let mut selection = DocumentSelection {
        available_count: documents.len(),
        ..DocumentSelection::default()
    };
    if documents.is_empty() {
        return (Vec::new(), selection);
    }

    let mut kept = Vec::new();
    let mut used = 0usize;
    for doc in documents {
        let cost = tokenizer.count_tokens(&format!("{doc}{joiner}"));
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(doc.clone());
    }

    if kept.is_empty() {
        let (truncated, tokens) = tokenizer.truncate_to(&documents[0], budget);
        selection.single_document_truncation_length = Some(truncated.chars().count());
        if !truncated.is_empty() {
            selection.selected_count = 1;
            selection.token_count = tokens;
            kept.push(truncated);
        }
        return (kept, selection);
    }

    selection.selected_count = kept.len();
    selection.token_count = used;
    (kept, selection)
}

/// Arrange selected documents for the prompt.
pub fn order_documents<T: Clone>(documents: &[T], ordering: DocsOrdering) -> Vec<T> {
    match ordering {
        DocsOrdering::BestFirst => documents.to_vec(),
        DocsOrdering::BestNearPrompt => documents.iter().rev().cloned().collect(),
        DocsOrdering::ReverseUcurve => reverse_ucurve(documents),
    }
}

/// Items at odd positions in order, then items at even positions in reverse.
///
/// `[1, 2, 3, 4, 5, 6, 7, 8]` becomes `[2, 4, 6, 8, 7, 5, 3, 1]`, so the
/// first (most relevant) item ends up last, next to the instruction, and the
/// second most relevant leads.
pub fn reverse_ucurve<T: Clone>(items: &[T]) -> Vec<T> {
    reverse_ucurve_indices(items.len())
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Inverse of [`reverse_ucurve`].
pub fn undo_reverse_ucurve<T: Clone>(items: &[T]) -> Vec<T> {
    let indices = reverse_ucurve_indices(items.len());
    let mut slots: Vec<Option<T>> = vec![None; items.len()];
    for (position, source) in indices.into_iter().enumerate() {
        slots[source] = Some(items[position].clone());
    }
    slots.into_iter().flatten().collect()
}

/// Source index for each output position of [`reverse_ucurve`].
fn reverse_ucurve_indices(len: usize) -> Vec<usize> {
    let odd = (1..len).step_by(2);
    let even = (0..len).step_by(2).rev();
    odd.chain(even).collect()
}
