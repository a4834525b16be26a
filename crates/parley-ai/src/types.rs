//! Core types for chat-completion interactions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "gpt-4o")
    pub id: String,
    /// Base URL for API calls
    pub base_url: String,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum output tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Additional headers for API calls
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Model {
    /// Default OpenAI endpoint
    pub const OPENAI_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Create a model definition against the OpenAI endpoint
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: Self::OPENAI_BASE_URL.to_string(),
            temperature: Some(0.0),
            max_tokens: None,
            headers: HashMap::new(),
        }
    }

    /// Override the base URL (for OpenAI-compatible gateways)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new("gpt-4o")
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    Stop,
    /// Maximum tokens reached
    Length,
    /// Tool use requested
    ToolUse,
    /// Error occurred
    Error,
}

/// Content blocks in messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Tool call request
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool call
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Check if this is a tool call
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// A borrowed view of a tool-call request on an assistant message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolCall<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub arguments: &'a serde_json::Value,
}

/// Conversation messages, tagged by role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// System instructions, normally the first message of a conversation
    System { content: Vec<Content> },
    /// User message
    User {
        content: Vec<Content>,
        #[serde(default)]
        timestamp: i64,
    },
    /// Assistant response
    Assistant {
        content: Vec<Content>,
        #[serde(flatten)]
        metadata: AssistantMetadata,
    },
    /// Tool result
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: Vec<Content>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        timestamp: i64,
    },
}

/// Metadata for assistant messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            content: vec![Content::text(text)],
        }
    }

    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::assistant_with_content(vec![Content::text(text)])
    }

    /// Create an assistant message with arbitrary content blocks
    pub fn assistant_with_content(content: Vec<Content>) -> Self {
        Self::Assistant {
            content,
            metadata: AssistantMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }

    /// Create a tool result message
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Vec<Content>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Get the role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// Get the content blocks
    pub fn content(&self) -> &[Content] {
        match self {
            Self::System { content } => content,
            Self::User { content, .. } => content,
            Self::Assistant { content, .. } => content,
            Self::ToolResult { content, .. } => content,
        }
    }

    /// The first tool-call request on an assistant message, if any.
    pub fn tool_call(&self) -> Option<ToolCall<'_>> {
        match self {
            Self::Assistant { content, .. } => content.iter().find_map(|c| match c {
                Content::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(ToolCall {
                    id,
                    name,
                    arguments,
                }),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Whether this is an assistant message requesting a tool
    pub fn has_tool_call(&self) -> bool {
        self.tool_call().is_some()
    }

    /// Name of the tool a tool-result message came from
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolResult { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Tool definition for function calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Context for a completion request
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Conversation messages, system message included
    pub messages: Vec<Message>,
    /// Available tools
    pub tools: Vec<Tool>,
}

impl Context {
    /// Create a context from a message sequence
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: vec![],
        }
    }

    /// Add a message to the context
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Add a tool to the context
    pub fn add_tool(&mut self, tool: Tool) {
        self.tools.push(tool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_found_on_assistant() {
        let msg = Message::assistant_with_content(vec![
            Content::text(""),
            Content::tool_call("call_1", "relay_bot", json!({"text": "hi"})),
        ]);
        let call = msg.tool_call().expect("tool call");
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "relay_bot");
        assert_eq!(call.arguments, &json!({"text": "hi"}));
        assert!(msg.has_tool_call());
    }

    #[test]
    fn test_tool_call_ignored_on_other_roles() {
        assert!(Message::user("hello").tool_call().is_none());
        assert!(Message::system("rules").tool_call().is_none());
        assert!(Message::assistant("plain").tool_call().is_none());
    }

    #[test]
    fn test_tool_result_carries_tool_name() {
        let msg = Message::tool_result("call_1", "relay_bot", vec![Content::text("\"ok\"")], false);
        assert_eq!(msg.tool_name(), Some("relay_bot"));
        assert_eq!(msg.role(), "tool_result");
        assert_eq!(msg.text(), "\"ok\"");
    }

    #[test]
    fn test_message_serializes_with_role_tag() {
        let value = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "be brief");
    }

    #[test]
    fn test_assistant_metadata_is_flattened() {
        let json = r#"{"role":"assistant","content":[{"type":"text","text":"hey"}],"model":"gpt-4o","stop_reason":"stop"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        match msg {
            Message::Assistant { metadata, .. } => {
                assert_eq!(metadata.model.as_deref(), Some("gpt-4o"));
                assert_eq!(metadata.stop_reason, Some(StopReason::Stop));
                assert_eq!(metadata.usage, Usage::default());
            }
            other => panic!("expected assistant, got {:?}", other),
        }
    }

    #[test]
    fn test_default_model() {
        let model = Model::default();
        assert_eq!(model.id, "gpt-4o");
        assert_eq!(model.temperature, Some(0.0));
        assert_eq!(model.base_url, Model::OPENAI_BASE_URL);
    }
}
