//! A fully drained stream.

use promptgate_core::{StreamEvent, StreamState};
use serde::{Deserialize, Serialize};

/// Every event a stream produced, with its final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTranscript {
    pub events: Vec<StreamEvent>,
    pub state: StreamState,
}

impl StreamTranscript {
    pub fn chunk_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Chunk { .. }))
            .count()
    }

    /// Concatenated chunk text.
    pub fn streamed_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The last event, if it is terminal.
    pub fn terminal(&self) -> Option<&StreamEvent> {
        self.events.last().filter(|e| e.is_terminal())
    }

    /// Exactly one terminal event, and it comes last.
    pub fn is_well_formed(&self) -> bool {
        let terminals = self.events.iter().filter(|e| e.is_terminal()).count();
        terminals == 1 && self.terminal().is_some()
    }
}
