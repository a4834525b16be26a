//! Streaming event types and utilities

use crate::error::{Error, Result};
use crate::types::{Message, StopReason, Usage};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a completion streams in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Initial message structure
    Start { message: Message },
    /// Text content delta
    TextDelta { content_index: usize, delta: String },
    /// Tool call started
    ToolCallStart {
        content_index: usize,
        id: String,
        name: String,
    },
    /// Tool call arguments delta (partial JSON)
    ToolCallDelta { content_index: usize, delta: String },
    /// Message completed successfully
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Error occurred
    Error {
        message: String,
        /// HTTP status when the service rejected the request
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl MessageEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageEvent::Done { .. } | MessageEvent::Error { .. })
    }

    /// Get the final message if this is a Done event
    pub fn into_message(self) -> Option<Message> {
        match self {
            MessageEvent::Done { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

/// Drain a stream until its terminal event and return the completed message.
///
/// A stream that ends without a `Done` event is reported as an unexpected
/// response. `Error` events map onto typed errors by HTTP status so callers
/// can tell retryable failures apart.
pub async fn collect_message(mut stream: MessageEventStream) -> Result<Message> {
    while let Some(event) = stream.next().await {
        match event {
            MessageEvent::Done { message, .. } => return Ok(message),
            MessageEvent::Error { message, status } => return Err(status_error(status, message)),
            MessageEvent::TextDelta { delta, .. } => {
                tracing::trace!(delta = %delta, "text delta");
            }
            _ => {}
        }
    }
    Err(Error::UnexpectedResponse(
        "stream ended without a completed message".to_string(),
    ))
}

fn status_error(status: Option<u16>, message: String) -> Error {
    match status {
        None => Error::Sse(message),
        Some(429) => Error::RateLimited { retry_after: None },
        Some(401) => Error::InvalidApiKey,
        Some(code) if code >= 500 => Error::api("server_error", message),
        Some(code) => Error::api(format!("http_{}", code), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(events: Vec<MessageEvent>) -> MessageEventStream {
        Box::pin(futures::stream::iter(events))
    }

    #[tokio::test]
    async fn test_collect_returns_done_message() {
        let stream = boxed(vec![
            MessageEvent::Start {
                message: Message::assistant_with_content(vec![]),
            },
            MessageEvent::TextDelta {
                content_index: 0,
                delta: "hel".into(),
            },
            MessageEvent::TextDelta {
                content_index: 0,
                delta: "lo".into(),
            },
            MessageEvent::Done {
                message: Message::assistant("hello"),
                stop_reason: StopReason::Stop,
                usage: Usage::default(),
            },
        ]);

        let message = collect_message(stream).await.unwrap();
        assert_eq!(message.text(), "hello");
    }

    #[tokio::test]
    async fn test_collect_surfaces_error_event() {
        let stream = boxed(vec![MessageEvent::Error {
            message: "boom".into(),
            status: None,
        }]);

        let err = collect_message(stream).await.unwrap_err();
        assert!(matches!(err, Error::Sse(ref m) if m == "boom"), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_collect_classifies_http_status() {
        let rate_limited = boxed(vec![MessageEvent::Error {
            message: "slow down".into(),
            status: Some(429),
        }]);
        let err = collect_message(rate_limited).await.unwrap_err();
        assert!(err.is_retryable());

        let unauthorized = boxed(vec![MessageEvent::Error {
            message: "bad key".into(),
            status: Some(401),
        }]);
        let err = collect_message(unauthorized).await.unwrap_err();
        assert!(matches!(err, Error::InvalidApiKey));
        assert!(!err.is_retryable());

        let bad_request = boxed(vec![MessageEvent::Error {
            message: "unknown model".into(),
            status: Some(404),
        }]);
        let err = collect_message(bad_request).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("http_404"));
    }

    #[tokio::test]
    async fn test_collect_rejects_truncated_stream() {
        let stream = boxed(vec![MessageEvent::TextDelta {
            content_index: 0,
            delta: "partial".into(),
        }]);

        let err = collect_message(stream).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[test]
    fn test_terminal_events() {
        assert!(
            MessageEvent::Error {
                message: "x".into(),
                status: None
            }
            .is_terminal()
        );
        assert!(
            !MessageEvent::TextDelta {
                content_index: 0,
                delta: "x".into()
            }
            .is_terminal()
        );
    }
}
