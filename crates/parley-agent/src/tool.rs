//! Tool gateway trait and invocation helpers

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Argument key carrying the session id into every tool invocation.
pub const SESSION_ID_ARG: &str = "session_id";

/// A single tool call, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Id of the tool-call request this invocation answers
    pub call_id: String,
    /// Registered tool name
    pub tool_name: String,
    /// Argument mapping, session id included
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Build an invocation from a tool-call request's raw arguments,
    /// injecting the session id.
    pub fn from_request(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        raw_arguments: &Value,
        session_id: &str,
    ) -> Result<Self> {
        let tool_name = tool_name.into();
        let mut arguments = parse_arguments(&tool_name, raw_arguments)?;
        arguments.insert(SESSION_ID_ARG.to_string(), Value::String(session_id.to_string()));
        Ok(Self {
            call_id: call_id.into(),
            tool_name,
            arguments,
        })
    }

    /// Arguments as a JSON value
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }

    /// Get a string argument
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// The injected session id
    pub fn session_id(&self) -> Option<&str> {
        self.str_arg(SESSION_ID_ARG)
    }
}

/// Interface to the single external capability the orchestrator may call.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Tool name (used in API calls and tool-result tags)
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> &str;

    /// JSON Schema for parameters, session id included
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Failures abort the turn.
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value>;
}

/// Convert a gateway into a parley_ai::Tool definition for the model
pub fn to_api_tool(tool: &dyn ToolGateway) -> parley_ai::Tool {
    parley_ai::Tool {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

/// Interpret tool-call arguments as a mapping.
///
/// Accepts a JSON object, or a string holding a JSON object as sent by
/// chat-completion APIs. `null` is treated as an empty mapping.
pub fn parse_arguments(tool_name: &str, raw: &Value) -> Result<Map<String, Value>> {
    let invalid = |reason: String| Error::InvalidToolArguments {
        tool: tool_name.to_string(),
        reason,
    };
    match raw {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(invalid(format!("expected an object, got {}", other))),
            Err(e) => Err(invalid(format!("arguments are not valid JSON: {}", e))),
        },
        other => Err(invalid(format!("expected an object, got {}", other))),
    }
}

/// Validate arguments using a pre-compiled validator.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
pub fn validate_with_validator(args: &Value, validator: &jsonschema::Validator) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Tool argument validation failed:\n{}",
            errors.join("\n")
        ))
    }
}
