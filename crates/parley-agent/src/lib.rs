//! parley-agent: session-scoped conversation orchestrator
//!
//! Each turn loads a session's conversation, asks the model for the next
//! message (or takes the trigger-phrase shortcut), runs the single
//! registered tool when asked to, and saves the result back to the store.

pub mod codec;
pub mod conversation;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod reply;
pub mod store;
pub mod tool;
pub mod window;

pub use conversation::Conversation;
pub use error::{Error, ErrorKind, Result};
pub use events::TurnEvent;
pub use model::{ModelGateway, ProviderGateway, RetryConfig};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Step, TriggerPhrase, route};
pub use reply::Reply;
pub use store::{MemoryStore, SessionStore};
pub use tool::{SESSION_ID_ARG, ToolGateway, ToolInvocation};
pub use window::MessageWindow;
