//! OpenAI Chat Completions API provider

use std::collections::HashSet;

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::{MessageEvent, MessageEventStream, collect_message},
    types::{AssistantMetadata, Content, Context, Message, Model, StopReason, Usage},
};

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Environment variable holding the API key
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Stream a response from the chat completions endpoint
    pub async fn stream(&self, model: &Model, context: &Context) -> Result<MessageEventStream> {
        let request = build_request(model, context);
        let url = format!("{}/chat/completions", model.base_url.trim_end_matches('/'));

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key)
            .parse::<reqwest::header::HeaderValue>()
            .map_err(|_| Error::InvalidApiKey)?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        // Add model-specific headers
        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (
                key.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, val);
            }
        }

        let request_builder = self.client.post(&url).headers(headers).json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.clone())))
    }

    /// Run a completion to the end and return the single assistant message
    pub async fn complete(&self, model: &Model, context: &Context) -> Result<Message> {
        let stream = self.stream(model, context).await?;
        collect_message(stream).await
    }
}

fn build_request(model: &Model, context: &Context) -> OpenAIRequest {
    let messages = convert_messages(&context.messages);

    let tools = if context.tools.is_empty() {
        None
    } else {
        Some(
            context
                .tools
                .iter()
                .map(|t| OpenAITool {
                    tool_type: "function".to_string(),
                    function: OpenAIFunction {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(t.parameters.clone()),
                    },
                })
                .collect(),
        )
    };

    let has_tools = tools.is_some();
    OpenAIRequest {
        model: model.id.clone(),
        messages,
        stream: true,
        max_tokens: model.max_tokens,
        temperature: model.temperature,
        tools,
        tool_choice: has_tools.then(|| serde_json::json!("auto")),
    }
}

fn text_of(content: &[Content]) -> String {
    content
        .iter()
        .filter_map(|c| c.as_text())
        .collect::<Vec<_>>()
        .join("")
}

/// Convert a message sequence for the wire.
///
/// A `tool` message must answer a `tool_calls` entry earlier in the same
/// request. Tool results whose call is not in the request (a bounded history
/// can start between the two) are sent as plain assistant text instead.
fn convert_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
    let mut requested: HashSet<&str> = HashSet::new();
    let mut converted = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg {
            Message::Assistant { content, .. } => {
                requested.extend(content.iter().filter_map(|c| match c {
                    Content::ToolCall { id, .. } => Some(id.as_str()),
                    _ => None,
                }));
                converted.push(convert_message(msg));
            }
            Message::ToolResult {
                tool_call_id,
                content,
                ..
            } if !requested.contains(tool_call_id.as_str()) => {
                tracing::debug!(
                    tool_call_id = %tool_call_id,
                    "sending unpaired tool result as assistant text"
                );
                converted.push(OpenAIMessage {
                    role: "assistant".to_string(),
                    content: Some(text_of(content)),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            _ => converted.push(convert_message(msg)),
        }
    }

    converted
}

fn convert_message(msg: &Message) -> OpenAIMessage {
    match msg {
        Message::System { content } => OpenAIMessage {
            role: "system".to_string(),
            content: Some(text_of(content)),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::User { content, .. } => OpenAIMessage {
            role: "user".to_string(),
            content: Some(text_of(content)),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::Assistant { content, .. } => {
            let tool_calls: Vec<OpenAIToolCall> = content
                .iter()
                .filter_map(|c| match c {
                    Content::ToolCall {
                        id,
                        name,
                        arguments,
                    } => Some(OpenAIToolCall {
                        id: id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: name.clone(),
                            arguments: match arguments {
                                serde_json::Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    }),
                    _ => None,
                })
                .collect();

            let text = text_of(content);
            OpenAIMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            }
        }
        Message::ToolResult {
            tool_call_id,
            content,
            ..
        } => OpenAIMessage {
            role: "tool".to_string(),
            content: Some(text_of(content)),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.clone()),
        },
    }
}

fn create_stream(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut accumulated_text = String::new();
        let mut tool_calls: Vec<(String, String, String)> = Vec::new(); // (id, name, args)
        let mut finish_reason: Option<String> = None;
        let mut usage = Usage::default();

        yield MessageEvent::Start {
            message: Message::Assistant {
                content: vec![],
                metadata: AssistantMetadata {
                    model: Some(model.id.clone()),
                    ..Default::default()
                },
            },
        };

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        event_source.close();
                        break;
                    }

                    let chunk: std::result::Result<StreamChunk, _> = serde_json::from_str(&msg.data);
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            event_source.close();
                            yield MessageEvent::Error {
                                message: format!("Failed to parse chunk: {}", e),
                                status: None,
                            };
                            return;
                        }
                    };

                    for choice in &chunk.choices {
                        if let Some(ref content) = choice.delta.content {
                            accumulated_text.push_str(content);
                            yield MessageEvent::TextDelta {
                                content_index: 0,
                                delta: content.clone(),
                            };
                        }

                        if let Some(ref tcs) = choice.delta.tool_calls {
                            for tc in tcs {
                                let idx = tc.index as usize;
                                while tool_calls.len() <= idx {
                                    tool_calls.push((String::new(), String::new(), String::new()));
                                }

                                if let Some(ref id) = tc.id {
                                    tool_calls[idx].0 = id.clone();
                                }
                                if let Some(ref function) = tc.function {
                                    if let Some(ref name) = function.name {
                                        tool_calls[idx].1 = name.clone();
                                        yield MessageEvent::ToolCallStart {
                                            content_index: idx,
                                            id: tool_calls[idx].0.clone(),
                                            name: name.clone(),
                                        };
                                    }
                                    if let Some(ref args) = function.arguments {
                                        tool_calls[idx].2.push_str(args);
                                        yield MessageEvent::ToolCallDelta {
                                            content_index: idx,
                                            delta: args.clone(),
                                        };
                                    }
                                }
                            }
                        }

                        if let Some(ref reason) = choice.finish_reason {
                            finish_reason = Some(reason.clone());
                        }
                    }

                    if let Some(ref stream_usage) = chunk.usage {
                        usage.input = stream_usage.prompt_tokens;
                        usage.output = stream_usage.completion_tokens;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    event_source.close();
                    let body = response.text().await.unwrap_or_default();
                    yield MessageEvent::Error {
                        message: api_error_message(&body).unwrap_or(body),
                        status: Some(status.as_u16()),
                    };
                    return;
                }
                Err(e) => {
                    event_source.close();
                    yield MessageEvent::Error {
                        message: format!("SSE error: {}", e),
                        status: None,
                    };
                    return;
                }
            }
        }

        // Text and tool call are mutually exclusive on the final message:
        // a tool request wins over any preamble text.
        let mut content = Vec::new();
        for (id, name, args) in tool_calls {
            if !id.is_empty() && !name.is_empty() {
                let arguments = serde_json::from_str(&args).unwrap_or(serde_json::json!({}));
                content.push(Content::ToolCall { id, name, arguments });
            }
        }
        if content.is_empty() {
            content.push(Content::Text { text: accumulated_text });
        }

        let stop_reason = match finish_reason.as_deref() {
            Some("length") => StopReason::Length,
            Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
            _ => StopReason::Stop,
        };

        let final_message = Message::Assistant {
            content,
            metadata: AssistantMetadata {
                model: Some(model.id.clone()),
                usage: usage.clone(),
                stop_reason: Some(stop_reason),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        yield MessageEvent::Done {
            message: final_message,
            stop_reason,
            usage,
        };
    }
}

/// Pull `error.message` out of an OpenAI error body.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    Some(parsed.error.message)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: i32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
