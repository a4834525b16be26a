//! Message window: bounds the history handed to the model gateway.
//!
//! The first message (the system/seed message) is always kept, followed by
//! the most recent `recent` messages. Sequences of `recent` messages or fewer
//! pass through untouched, so the bounded length is at most `recent + 1`.

use parley_ai::Message;

/// Number of trailing messages kept by the default window.
pub const DEFAULT_RECENT_MESSAGES: usize = 10;

/// Window policy over a chronological message sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageWindow {
    recent: usize,
}

impl MessageWindow {
    /// Create a window keeping the first message plus `recent` trailing messages.
    pub fn new(recent: usize) -> Self {
        Self { recent }
    }

    /// Number of trailing messages kept
    pub fn recent(&self) -> usize {
        self.recent
    }

    /// Maximum length of a bounded sequence
    pub fn max_len(&self) -> usize {
        self.recent + 1
    }

    /// Bound `messages`, preserving order.
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if messages.len() <= self.recent {
            return messages.to_vec();
        }
        let tail = &messages[messages.len() - self.recent..];
        let mut bounded = Vec::with_capacity(self.recent + 1);
        bounded.push(messages[0].clone());
        bounded.extend_from_slice(tail);
        bounded
    }
}

impl Default for MessageWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_MESSAGES)
    }
}
