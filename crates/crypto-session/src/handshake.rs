//! Shared-secret derivation (NaCl `crypto_box_beforenm`)

use std::fmt;

use salsa20::cipher::consts::U10;
use salsa20::cipher::generic_array::GenericArray;
use salsa20::hsalsa;
use tracing::{debug, warn};
use x25519_dalek::PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, CryptoResult, EncryptionPublicKey, KeyPair, SHARED_SECRET_SIZE};

/// Symmetric key shared with the wallet
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Derive the box key from our secret and the wallet's public key
///
/// X25519 followed by HSalsa20 over a zero input, so the wallet derives the
/// identical key from its secret and our public key.
pub fn derive_shared_secret(
    local: &KeyPair,
    remote: &EncryptionPublicKey,
) -> CryptoResult<SharedSecret> {
    let dh = local
        .secret()
        .diffie_hellman(&PublicKey::from(*remote.as_bytes()));

    // Low-order points give an all-zero output that any attacker can predict
    if !dh.was_contributory() {
        warn!("Rejected non-contributory wallet key {}", remote);
        return Err(CryptoError::InvalidPublicKey);
    }

    let mut key = hsalsa::<U10>(GenericArray::from_slice(dh.as_bytes()), &GenericArray::default());

    let mut bytes = [0u8; SHARED_SECRET_SIZE];
    bytes.copy_from_slice(&key);
    key.as_mut_slice().zeroize();

    debug!("Derived shared secret with wallet key {}", remote);
    Ok(SharedSecret(bytes))
}
