//! Core error types.

use thiserror::Error;

/// Errors from the FSM engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error("unknown state `{id}` referenced by a transition")]
    UnknownState { id: String },

    #[error("script compile error: {reason}")]
    ScriptCompile { reason: String },

    #[error("script evaluation error: {reason}")]
    ScriptEval { reason: String },
}

impl CoreError {
    /// Returns whether the executor can absorb this error and keep running.
    ///
    /// Load- and compile-class errors are fatal at build time; evaluation
    /// errors are logged and execution continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::ScriptEval { .. })
    }
}
