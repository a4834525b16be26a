//! Error types for parley-agent

use thiserror::Error;

/// Result type alias using parley-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure classes for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The orchestrator was driven with inputs it cannot act on
    Configuration,
    /// The model or tool gateway failed
    Upstream,
    /// The session store could not be read or written
    Storage,
}

/// Errors that abort a turn. None of them leave a partially saved session.
#[derive(Error, Debug)]
pub enum Error {
    /// No session id was supplied for the turn
    #[error("Session ID is missing")]
    MissingSessionId,

    /// A tool call named a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments could not be parsed or failed schema validation
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    /// The model gateway failed
    #[error(transparent)]
    Model(#[from] parley_ai::Error),

    /// The tool gateway failed
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// The session store failed
    #[error("Session store error: {0}")]
    Store(String),
}

impl Error {
    /// Create a tool failure
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a store failure
    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingSessionId | Error::UnknownTool(_) | Error::InvalidToolArguments { .. } => {
                ErrorKind::Configuration
            }
            Error::Model(_) | Error::Tool { .. } => ErrorKind::Upstream,
            Error::Store(_) => ErrorKind::Storage,
        }
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
