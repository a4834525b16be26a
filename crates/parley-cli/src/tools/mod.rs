//! Tool gateways for the task bot

mod bot;
mod echo;

pub use bot::HttpBotTool;
pub use echo::EchoTool;

use serde_json::json;

/// Name the bot tool is registered and advertised under
pub const BOT_TOOL_NAME: &str = "relay_bot";

const BOT_TOOL_DESCRIPTION: &str =
    "Forward the user's text to the task bot and return the bot's reply.";

/// Parameter schema shared by every bot gateway
pub fn bot_parameters_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "text": {
                "type": "string",
                "description": "The user's text, verbatim"
            },
            "session_id": {
                "type": "string",
                "description": "Conversation session id (filled in automatically)"
            }
        },
        "required": ["text"]
    })
}
