//! Offline stand-in for the task bot

use async_trait::async_trait;
use parley_agent::{Result, ToolGateway, ToolInvocation};
use serde_json::Value;

use super::{BOT_TOOL_DESCRIPTION, BOT_TOOL_NAME, bot_parameters_schema};

/// Replies with the `text` argument it was given.
pub struct EchoTool;

impl EchoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolGateway for EchoTool {
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
        Ok(Value::String(
            invocation.str_arg("text").unwrap_or_default().to_string(),
        ))
    }
}
