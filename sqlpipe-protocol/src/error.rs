//! Session-level error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error reported by the server for a request or a batch step.
///
/// The `code` is a stable machine-readable identifier (for SQL errors, the
/// engine's extended error name); the message is free-form. Both are part of
/// the protocol contract and are preserved verbatim for callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServerError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Failures surfaced by a protocol session or one of its streams.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed: socket error, handshake failure, abrupt close.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a protocol-level error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The session or stream is closed; no further requests are accepted.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SessionError::Transport(err.into())
    }
}
