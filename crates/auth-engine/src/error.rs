//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Transport-level failure (DNS, connection refused, TLS). Surfaced
    /// as-is and never retried; distinct from an authorization failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] client_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller-supplied header name or value could not be encoded
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid transition in the request retry state machine
    #[error("Invalid request state transition: {0}")]
    InvalidStateTransition(String),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
