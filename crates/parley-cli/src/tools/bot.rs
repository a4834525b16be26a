//! HTTP task bot tool

use async_trait::async_trait;
use parley_agent::{Error, Result, ToolGateway, ToolInvocation};
use serde_json::Value;
use std::time::Duration;

use super::{BOT_TOOL_DESCRIPTION, BOT_TOOL_NAME, bot_parameters_schema};
use crate::utils::truncate_chars;

/// Forwards invocations to a task bot over HTTP.
///
/// The arguments (session id included) are POSTed as a JSON object. A JSON
/// response body is returned as-is; any other body is returned as a string.
pub struct HttpBotTool {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpBotTool {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    fn failure(&self, message: impl Into<String>) -> Error {
        Error::tool(BOT_TOOL_NAME, message)
    }
}

#[async_trait]
impl ToolGateway for HttpBotTool {
    fn name(&self) -> &str {
        BOT_TOOL_NAME
    }

    fn description(&self) -> &str {
        BOT_TOOL_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        bot_parameters_schema()
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value> {
        tracing::debug!(url = %self.url, "posting to bot");
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&invocation.arguments)
            .send()
            .await
            .map_err(|e| self.failure(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.failure(format!("failed to read bot response: {}", e)))?;

        if !status.is_success() {
            return Err(self.failure(format!(
                "bot returned {}: {}",
                status,
                truncate_chars(&body, 200)
            )));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/bot", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    fn invocation() -> ToolInvocation {
        ToolInvocation::from_request("c1", BOT_TOOL_NAME, &json!({"text": "book a room"}), "s1")
            .unwrap()
    }

    #[tokio::test]
    async fn test_posts_arguments_and_parses_json_reply() {
        let (url, server) = serve_once("200 OK", r#"{"message":"Which city?"}"#).await;
        let tool = HttpBotTool::new(url, Duration::from_secs(5));

        let output = tool.invoke(&invocation()).await.unwrap();
        assert_eq!(output, json!({"message": "Which city?"}));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /bot"));
        assert!(request.contains(r#""session_id":"s1""#), "got: {}", request);
        assert!(request.contains(r#""text":"book a room""#), "got: {}", request);
    }

    #[tokio::test]
    async fn test_non_json_reply_is_returned_as_string() {
        let (url, server) = serve_once("200 OK", "plain words").await;
        let tool = HttpBotTool::new(url, Duration::from_secs(5));

        let output = tool.invoke(&invocation()).await.unwrap();
        assert_eq!(output, json!("plain words"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_a_tool_failure() {
        let (url, server) = serve_once("503 Service Unavailable", "down").await;
        let tool = HttpBotTool::new(url, Duration::from_secs(5));

        let err = tool.invoke(&invocation()).await.unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
        assert!(err.to_string().contains("503"), "got: {}", err);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_bot_is_a_tool_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/bot", listener.local_addr().unwrap());
        drop(listener);

        let tool = HttpBotTool::new(url, Duration::from_secs(2));
        let err = tool.invoke(&invocation()).await.unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
    }
}
