//! Error types for the protocol

use thiserror::Error;

use crate::{RequestKind, SessionState};

/// Protocol error
///
/// Everything except [`ProtocolError::EntropyFailure`] is recoverable: the
/// session machine falls back to a safe prior state and hands the error to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailure,

    #[error("Malformed JSON payload: {0}")]
    MalformedJson(String),

    #[error("Wallet returned error {code}: {message}")]
    RemoteErrorCode { code: i64, message: String },

    #[error("No active session")]
    NoActiveSession,

    #[error("Secure random source unavailable: {0}")]
    EntropyFailure(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Timeout: no wallet response to {0} request")]
    Timeout(RequestKind),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SessionState, to: SessionState },

    #[error("Failed to open link: {0}")]
    OpenFailed(String),

    #[error("Session router stopped")]
    RouterClosed,

    #[error("Deep-link queue full, retry later")]
    QueueFull,
}

impl ProtocolError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::EntropyFailure(_))
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson(err.to_string())
    }
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
