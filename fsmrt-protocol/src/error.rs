//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding channel messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no `type` field")]
    MissingType,

    #[error("unexpected message type `{0}`")]
    UnexpectedType(String),
}
