//! parley-ai: message types and completion provider
//!
//! This crate provides the conversation message model shared by the
//! orchestrator and the OpenAI-compatible chat-completions client that
//! backs the default model gateway.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::MessageEventStream;
pub use types::*;
