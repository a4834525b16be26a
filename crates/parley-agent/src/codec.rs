//! Versioned encoding of a conversation for the session store.
//!
//! Stored blobs are JSON envelopes:
//!
//! ```json
//! {"format": "parley.conversation", "version": "1", "messages": [...]}
//! ```
//!
//! Decoding reports an unknown version separately from unreadable data so
//! callers can log the two cases differently.

use parley_ai::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Conversation;

/// Envelope format marker
pub const FORMAT: &str = "parley.conversation";

/// Version written by [`encode`]
pub const CURRENT_VERSION: &str = "1";

/// Reasons a stored blob could not be turned back into a conversation
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The blob is not a conversation envelope, or its payload is malformed
    #[error("corrupt conversation state: {0}")]
    Corrupt(String),

    /// The envelope has no version marker
    #[error("conversation state has no version")]
    MissingVersion,

    /// The envelope was written by an unknown format version
    #[error("unsupported conversation state version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'static str,
    version: &'static str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct Header {
    format: Option<String>,
    version: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct EnvelopeV1 {
    messages: Vec<Message>,
}

/// Serialize a conversation into the current envelope version
pub fn encode(conversation: &Conversation) -> serde_json::Result<String> {
    serde_json::to_string(&EnvelopeRef {
        format: FORMAT,
        version: CURRENT_VERSION,
        messages: &conversation.messages,
    })
}

/// Parse a stored blob back into a conversation
pub fn decode(blob: &str) -> Result<Conversation, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(blob).map_err(|e| DecodeError::Corrupt(e.to_string()))?;

    let header = Header::deserialize(&value).map_err(|e| DecodeError::Corrupt(e.to_string()))?;
    if header.format.as_deref() != Some(FORMAT) {
        return Err(DecodeError::Corrupt(format!(
            "expected format '{}', found {:?}",
            FORMAT, header.format
        )));
    }

    let version = match header.version {
        None => return Err(DecodeError::MissingVersion),
        Some(serde_json::Value::String(v)) => v,
        Some(other) => other.to_string(),
    };

    match version.as_str() {
        "1" => {
            let envelope =
                EnvelopeV1::deserialize(&value).map_err(|e| DecodeError::Corrupt(e.to_string()))?;
            Ok(Conversation::from_messages(envelope.messages))
        }
        _ => Err(DecodeError::UnsupportedVersion(version)),
    }
}
