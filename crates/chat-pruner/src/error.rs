//! Error types for each layer.
//!
//! [`GatewayError`] covers the completion endpoint, [`StoreError`] the
//! persistence port, and [`SessionError`] is what callers of the session API
//! see. Summarization failures are a [`GatewayError`] scoped to the one-shot
//! summary call and never escape the pruning policy.

use std::time::Duration;
use thiserror::Error;

/// Failure of a completion gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("response contained no completion")]
    EmptyResult,
}

/// Failure of the transcript persistence port.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(String),

    #[error("conversation {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("invalid conversation id {0:?}")]
    InvalidId(String),

    #[error("I/O error on conversation {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(id: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            id: id.to_string(),
            source,
        }
    }
}

/// Error returned from the session API.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message cannot be empty")]
    EmptyInput,

    #[error("completion failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("conversation {0} is busy with another message")]
    Busy(String),

    /// The conversation id cannot be used with the configured store.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("conversation {id} could not be opened: {reason}")]
    Open { id: String, reason: String },
}
