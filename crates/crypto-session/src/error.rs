//! Crypto session error types

use link_protocol::ProtocolError;
use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Secure random source failed: {0}")]
    Entropy(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    #[error("Payload serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Decrypted payload is not valid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("Invalid base58 in {field}: {reason}")]
    InvalidEncoding { field: &'static str, reason: String },

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    #[error("Invalid public key")]
    InvalidPublicKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Entropy(reason) => ProtocolError::EntropyFailure(reason),
            CryptoError::Encryption(reason) => ProtocolError::Encryption(reason),
            CryptoError::Serialization(e) => ProtocolError::Encryption(e.to_string()),
            CryptoError::DecryptionFailed => ProtocolError::DecryptionFailure,
            CryptoError::MalformedJson(e) => ProtocolError::MalformedJson(e.to_string()),
            CryptoError::InvalidEncoding { field, reason } => {
                ProtocolError::InvalidParameter { name: field, reason }
            }
            CryptoError::InvalidKeyLength { expected, actual } => ProtocolError::invalid(
                "public_key",
                format!("expected {} bytes, got {}", expected, actual),
            ),
            CryptoError::InvalidNonceLength { expected, actual } => ProtocolError::invalid(
                "nonce",
                format!("expected {} bytes, got {}", expected, actual),
            ),
            CryptoError::InvalidPublicKey => {
                ProtocolError::invalid("public_key", "low-order point")
            }
        }
    }
}
