//! Ephemeral key pairs for the wallet handshake

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, PUBLIC_KEY_SIZE};

/// Fill `buf` from the OS entropy source
pub(crate) fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Entropy(e.to_string()))
}

/// X25519 public key as exchanged on the wire (base58 text)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionPublicKey([u8; PUBLIC_KEY_SIZE]);

impl EncryptionPublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Decode a base58 key; `field` names the parameter it came from
    pub fn from_base58(field: &'static str, encoded: &str) -> CryptoResult<Self> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::InvalidEncoding {
                field,
                reason: e.to_string(),
            })?;

        let bytes: [u8; PUBLIC_KEY_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_SIZE,
                    actual: bytes.len(),
                })?;

        Ok(Self(bytes))
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionPublicKey({})", self.to_base58())
    }
}

impl fmt::Display for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

/// Key pair for the handshake
///
/// Only the public half ever leaves the process. The secret is zeroized on
/// drop and is not reachable outside this crate.
pub struct KeyPair {
    secret: StaticSecret,
    public: EncryptionPublicKey,
}

impl KeyPair {
    /// Generate a new key pair from the OS entropy source
    pub fn generate() -> CryptoResult<Self> {
        let mut seed = Zeroizing::new([0u8; 32]);
        fill_random(&mut *seed)?;
        Ok(Self::from_secret_bytes(*seed))
    }

    /// Rebuild a key pair from a known secret (clamped per RFC 7748)
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let secret = StaticSecret::from(secret);
        let public = EncryptionPublicKey(*PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Get the public key
    pub fn public_key(&self) -> EncryptionPublicKey {
        self.public
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
