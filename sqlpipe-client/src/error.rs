//! Client error taxonomy.
//!
//! Every failure surfaced by the transport collaborators is normalized into
//! [`ClientError`]; server messages and machine-readable codes are preserved
//! verbatim for programmatic matching.

use sqlpipe_protocol::{ServerError, SessionError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The URL scheme does not match any backend.
    #[error("unsupported URL scheme: {0:?}")]
    UnsupportedScheme(String),

    /// The configuration is invalid; raised before any network activity.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transaction mode string is not one of `write`, `read`,
    /// `deferred`; raised before any network activity.
    #[error("unknown transaction mode: {0:?}")]
    InvalidMode(String),

    /// The transport failed. The connection layer replaces the connection
    /// for subsequent operations; the in-flight operation is not retried.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A protocol-level error reported by the server.
    #[error("server error: {message}")]
    Server {
        message: String,
        code: Option<String>,
    },

    /// A batch step failed; the whole batch was rolled back. `step` is the
    /// zero-based index of the first failing step in the dispatched chain
    /// (step 0 is the transaction begin for atomic batches).
    #[error("batch aborted at step {step}: {message}")]
    BatchAborted {
        step: usize,
        message: String,
        code: Option<String>,
    },

    /// The server rejected a SQL-text upload for lack of capacity.
    #[error("SQL store capacity exhausted: {message}")]
    SqlStoreCapacity {
        message: String,
        code: Option<String>,
    },

    /// The transaction has already been committed or rolled back.
    #[error("transaction closed")]
    TransactionClosed,

    /// The stream session has been closed; no further operations.
    #[error("stream closed")]
    StreamClosed,

    /// The client has been closed; no further operations.
    #[error("client closed")]
    ClientClosed,
}

impl ClientError {
    /// The server's machine-readable error code, if one was reported.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Server { code, .. }
            | ClientError::BatchAborted { code, .. }
            | ClientError::SqlStoreCapacity { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether retrying on a fresh connection could succeed. Retrying is
    /// the caller's decision; the client never retries a statement itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    pub(crate) fn from_server(err: ServerError) -> Self {
        let ServerError { message, code } = err;
        match &code {
            Some(c) if c.starts_with("SQL_STORE") => {
                ClientError::SqlStoreCapacity { message, code }
            }
            _ => ClientError::Server { message, code },
        }
    }

    pub(crate) fn batch_aborted(step: usize, err: ServerError) -> Self {
        ClientError::BatchAborted {
            step,
            message: err.message,
            code: err.code,
        }
    }
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Transport(e) => ClientError::Transport(e),
            SessionError::Server(e) => ClientError::from_server(e),
            SessionError::Closed => ClientError::StreamClosed,
        }
    }
}
