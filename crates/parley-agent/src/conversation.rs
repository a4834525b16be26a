//! Conversation state: the ordered message history of one session.

use parley_ai::Message;

/// Chronological message history of a single session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    /// Conversation messages, oldest first
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Wrap an existing message sequence
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Start a new conversation from a system prompt and the first user message
    pub fn seeded(system_prompt: &str, first: Message) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), first],
        }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the most recent user message
    pub fn latest_user_text(&self) -> Option<String> {
        latest_user_text(&self.messages)
    }
}

/// Text of the most recent user message in `messages`
pub fn latest_user_text(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m, Message::User { .. }))
        .map(Message::text)
}
