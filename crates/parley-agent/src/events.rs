//! Turn event types

use parley_ai::Message;
use serde::{Deserialize, Serialize};

use crate::orchestrator::Step;

/// Events emitted while a turn runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A turn started for a session
    TurnStart {
        session_id: String,
        /// Whether prior state was restored from the store
        resumed: bool,
    },

    /// The state machine entered a step
    StepEnter { step: Step },

    /// A step appended a message to the conversation
    MessageAppended { message: Message },

    /// Tool invocation started
    ToolInvocationStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// Tool invocation completed
    ToolInvocationEnd {
        tool_call_id: String,
        tool_name: String,
    },

    /// The turn reached its terminal state and was saved
    TurnEnd {
        session_id: String,
        message_count: usize,
    },

    /// The turn failed; nothing was saved
    Error { message: String },
}

impl TurnEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::TurnEnd { .. } | TurnEvent::Error { .. })
    }
}
