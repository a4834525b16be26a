use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_agent::{
    MemoryStore, Orchestrator, OrchestratorConfig, ProviderGateway, RetryConfig, ToolGateway,
    ToolInvocation, codec, tool::to_api_tool,
};
use parley_ai::{Model, providers::OpenAIProvider};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ===== Fake chat-completions endpoint =====

/// Answers every completion with "hello", and rejects requests carrying a
/// `tool` message without a matching earlier `tool_calls` entry.
struct FakeCompletions {
    base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeCompletions {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let body = read_body(&mut socket).await;
                let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let rejected = has_unpaired_tool_message(&request);
                seen.lock().push(request);

                let response = if rejected {
                    let error = json!({"error": {"message": "tool message without tool_calls"}})
                        .to_string();
                    format!(
                        "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        error.len(),
                        error
                    )
                } else {
                    let chunk = json!({
                        "choices": [{"delta": {"content": "hello"}, "finish_reason": "stop"}]
                    });
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\ndata: {}\n\ndata: [DONE]\n\n",
                        chunk
                    )
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { base_url, requests }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }
}

async fn read_body(socket: &mut TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            return Vec::new();
        }
        request.extend_from_slice(&buf[..n]);

        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        let start = end + 4;
        if request.len() >= start + length {
            return request[start..start + length].to_vec();
        }
    }
}

fn has_unpaired_tool_message(request: &Value) -> bool {
    let mut requested = HashSet::new();
    for message in request["messages"].as_array().into_iter().flatten() {
        for call in message["tool_calls"].as_array().into_iter().flatten() {
            requested.insert(call["id"].as_str().unwrap_or_default().to_string());
        }
        if message["role"] == "tool"
            && !requested.contains(message["tool_call_id"].as_str().unwrap_or_default())
        {
            return true;
        }
    }
    false
}

struct EchoTool;

#[async_trait]
impl ToolGateway for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the text argument"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "session_id": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> parley_agent::Result<Value> {
        Ok(json!(invocation.str_arg("text").unwrap_or_default()))
    }
}

// ===== Windowed history over the wire =====

#[tokio::test]
async fn test_window_starting_at_tool_result_still_reaches_model() {
    let server = FakeCompletions::start().await;
    let tool = Arc::new(EchoTool);
    let gateway = ProviderGateway::new(
        OpenAIProvider::new("sk-test"),
        Model::default().with_base_url(server.base_url.clone()),
    )
    .with_tool(to_api_tool(tool.as_ref()))
    .with_retry_config(RetryConfig::none());
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(gateway),
        tool,
        store.clone(),
    );

    orchestrator.process("hello code", "s1").await.unwrap();
    // The fifth plain turn windows the history to start at the tool result.
    for i in 0..5 {
        let reply = orchestrator.process(&format!("turn {i}"), "s1").await.unwrap();
        assert_eq!(reply.text(), "hello");
    }

    let requests = server.requests();
    assert_eq!(requests.len(), 5);
    let last = requests[4]["messages"].as_array().unwrap();
    assert_eq!(last.len(), 11);
    assert_eq!(last[0]["role"], "system");
    assert_eq!(last[1]["role"], "assistant");
    assert_eq!(last[1]["content"], "\"hello code\"");
    assert!(requests.iter().all(|r| !has_unpaired_tool_message(r)));

    let stored = codec::decode(&store.get("s1").unwrap()).unwrap();
    assert_eq!(stored.len(), 14);
    assert_eq!(stored.messages[3].role(), "tool_result");
}

#[tokio::test]
async fn test_paired_tool_result_is_sent_with_tool_role() {
    let server = FakeCompletions::start().await;
    let tool = Arc::new(EchoTool);
    let gateway = ProviderGateway::new(
        OpenAIProvider::new("sk-test"),
        Model::default().with_base_url(server.base_url.clone()),
    )
    .with_retry_config(RetryConfig::none());
    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(gateway),
        tool,
        Arc::new(MemoryStore::new()),
    );

    orchestrator.process("hello code", "s1").await.unwrap();
    orchestrator.process("thanks", "s1").await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let messages = requests[0]["messages"].as_array().unwrap();
    let roles: Vec<_> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "tool", "user"]);
    assert_eq!(messages[3]["tool_call_id"], messages[2]["tool_calls"][0]["id"]);
}
