//! Caller-facing view of a turn's final message.

use parley_ai::Message;
use serde_json::{Value, json};

/// The final message of a turn, unwrapped for callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The assistant answered in text
    Text(String),
    /// The turn ended in a tool result; holds the re-parsed tool output
    Tool { tool_name: String, output: Value },
}

impl Reply {
    /// Unwrap a final message.
    ///
    /// Tool-result content is parsed back as JSON; content that is not JSON
    /// is kept as a JSON string.
    pub fn from_message(message: &Message) -> Self {
        match message {
            Message::ToolResult { tool_name, .. } => {
                let text = message.text();
                let output = serde_json::from_str(&text).unwrap_or(Value::String(text));
                Reply::Tool {
                    tool_name: tool_name.clone(),
                    output,
                }
            }
            other => Reply::Text(other.text()),
        }
    }

    /// Render the reply as JSON.
    ///
    /// Tool replies render as the tool output itself; text replies render
    /// as `{"messages": [{"content": text}]}`.
    pub fn to_json(&self) -> Value {
        match self {
            Reply::Tool { output, .. } => output.clone(),
            Reply::Text(text) => json!({ "messages": [{ "content": text }] }),
        }
    }

    /// Plain-text rendering for terminals
    pub fn display_text(&self) -> String {
        match self {
            Reply::Text(text) => text.clone(),
            Reply::Tool { output, .. } => match output {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}
