//! Stream events: what a consumer sees while a generation runs.
//!
//! A well-formed stream is zero or more `Chunk` events followed by exactly
//! one terminal event (`Done`, `Error`, `TimedOut`, or `Cancelled`).

use serde::{Deserialize, Serialize};

use crate::error::StreamErrorKind;

/// One item of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A newly generated fragment, in generation order
    Chunk { text: String },

    /// Generation finished; carries the complete text
    Done { text: String },

    /// The backend failed or panicked
    Error {
        kind: StreamErrorKind,
        message: String,
    },

    /// The wall-clock deadline passed; carries the text accumulated so far
    TimedOut { partial: String },

    /// The consumer cancelled; carries the text accumulated so far
    Cancelled { partial: String },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }

    /// The state a stream ends in after this event, if it is terminal.
    pub fn terminal_state(&self) -> Option<StreamState> {
        match self {
            Self::Chunk { .. } => None,
            Self::Done { .. } => Some(StreamState::Completed),
            Self::Error { .. } => Some(StreamState::Failed),
            Self::TimedOut { .. } => Some(StreamState::TimedOut),
            Self::Cancelled { .. } => Some(StreamState::Cancelled),
        }
    }

    /// Text carried by the event (fragment, final text, or partial text).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Chunk { text } | Self::Done { text } => Some(text),
            Self::TimedOut { partial } | Self::Cancelled { partial } => Some(partial),
            Self::Error { .. } => None,
        }
    }
}

/// Lifecycle of a stream.
///
/// `Idle → Running → {Completed | Failed | TimedOut | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl StreamState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_chunk_is_non_terminal() {
        assert!(!StreamEvent::chunk("a").is_terminal());
        assert!(StreamEvent::Done { text: "a".into() }.is_terminal());
        assert_eq!(
            StreamEvent::TimedOut {
                partial: "ab".into()
            }
            .terminal_state(),
            Some(StreamState::TimedOut)
        );
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = StreamEvent::Error {
            kind: StreamErrorKind::WorkerPanicked,
            message: "boom".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""kind":"worker_panicked""#));
    }

    #[test]
    fn finished_states() {
        assert!(!StreamState::Running.is_finished());
        assert!(StreamState::Cancelled.is_finished());
    }
}
