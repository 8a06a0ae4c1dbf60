//! JSON bodies carried inside the encrypted channel

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ProtocolResult};

/// Schema check applied to every decrypted wallet response
pub trait WalletResponse {
    fn validate(&self) -> ProtocolResult<()>;
}

fn require_non_empty(field: &str, value: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::MalformedJson(format!("empty field: {}", field)));
    }
    Ok(())
}

/// Decrypted body of a successful connect redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// Wallet account address (base58)
    pub public_key: String,
    /// Opaque session token scoping later requests to this handshake
    pub session: String,
}

impl WalletResponse for ConnectResponse {
    fn validate(&self) -> ProtocolResult<()> {
        require_non_empty("public_key", &self.public_key)?;
        require_non_empty("session", &self.session)
    }
}

/// Decrypted body of a successful sign-and-send redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    /// Signature of the submitted transaction
    pub signature: String,
}

impl WalletResponse for SignResponse {
    fn validate(&self) -> ProtocolResult<()> {
        require_non_empty("signature", &self.signature)
    }
}

/// Plaintext of the `payload` parameter of a sign-and-send link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignAndSendPayload {
    pub session: String,
    /// Serialized transaction, base58 encoded
    pub transaction: String,
}
