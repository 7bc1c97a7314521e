//! History window selection.
//!
//! Finds the longest suffix of the chat history that still fits, by binary
//! search over the drop index `k`. The predicate `fits(k)` must be monotone:
//! if keeping `history[k..]` fits, keeping any shorter suffix fits too.

use promptgate_core::ChatTurn;
use serde::{Deserialize, Serialize};

/// The turns kept for the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    /// Kept turns, oldest first, pinned turn included
    pub turns: Vec<ChatTurn>,

    /// Real turns dropped from the front
    pub dropped_count: usize,

    /// Whether `turns[0]` is a pinned system turn
    pub pinned: bool,
}

impl HistoryWindow {
    /// Kept turns that came from the caller's history.
    pub fn real_turns(&self) -> &[ChatTurn] {
        if self.pinned {
            &self.turns[1..]
        } else {
            &self.turns
        }
    }
}

/// Smallest `k` in `[lo, n]` with `fits(k)`, by binary search.
///
/// Returns `None` when even `fits(n)` is false. Assumes `fits` is monotone.
pub fn smallest_fitting_start<F>(lo: usize, n: usize, mut fits: F) -> Option<usize>
where
    F: FnMut(usize) -> bool,
{
    if lo > n || !fits(n) {
        return None;
    }
    let (mut low, mut high) = (lo, n);
    while low < high {
        let mid = low + (high - low) / 2;
        if fits(mid) {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    Some(low)
}

/// Reference implementation of [`smallest_fitting_start`].
pub fn linear_scan<F>(lo: usize, n: usize, mut fits: F) -> Option<usize>
where
    F: FnMut(usize) -> bool,
{
    (lo..=n).find(|&k| fits(k))
}

/// Selects the history window for a prompt.
///
/// `pinned` is a turn that must stay at index 0 whenever any history is
/// kept, used to carry the system prompt for models without a system role.
#[derive(Debug, Clone)]
pub struct HistorySelector {
    pinned: Option<ChatTurn>,
}

impl HistorySelector {
    pub fn new() -> Self {
        Self { pinned: None }
    }

    pub fn with_pinned(pinned: Option<ChatTurn>) -> Self {
        Self { pinned }
    }

    /// Keep the longest suffix of `history` for which `fits` holds.
    ///
    /// `fits` receives the full candidate window (pinned turn first). If no
    /// candidate fits, the window is empty and every turn counts as dropped.
    pub fn select<F>(&self, history: &[ChatTurn], mut fits: F) -> HistoryWindow
    where
        F: FnMut(&[ChatTurn]) -> bool,
    {
        let history: Vec<ChatTurn> = history
            .iter()
            .filter(|turn| !turn.is_dangling())
            .cloned()
            .collect();
        let real = history.len();

        let mut candidates: Vec<ChatTurn> = Vec::with_capacity(real + 1);
        candidates.extend(self.pinned.iter().cloned());
        let lo = candidates.len();
        candidates.extend(history);
        let n = candidates.len();

        let window = |k: usize| -> Vec<ChatTurn> {
            candidates[..lo]
                .iter()
                .chain(&candidates[k..])
                .cloned()
                .collect()
        };

        match smallest_fitting_start(lo, n, |k| fits(&window(k))) {
            Some(k) => HistoryWindow {
                turns: window(k),
                dropped_count: k - lo,
                pinned: lo == 1,
            },
            None => HistoryWindow {
                turns: Vec::new(),
                dropped_count: real,
                pinned: false,
            },
        }
    }
}

impl Default for HistorySelector {
    fn default() -> Self {
        Self::new()
    }
}
