//! Authenticated encryption of JSON payloads (NaCl `box.after`)

use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::keypair::fill_random;
use crate::{CryptoError, CryptoResult, SharedSecret, NONCE_SIZE, TAG_SIZE};

/// Nonce and sealed box, as carried in the `nonce` and `data`/`payload` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_SIZE],
    /// [16-byte auth tag][ciphertext]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn nonce_base58(&self) -> String {
        bs58::encode(self.nonce).into_string()
    }

    pub fn ciphertext_base58(&self) -> String {
        bs58::encode(&self.ciphertext).into_string()
    }

    /// Decode the base58 `nonce` and `data` parameters of a redirect
    pub fn from_base58(nonce: &str, ciphertext: &str) -> CryptoResult<Self> {
        let nonce_bytes = decode_base58("nonce", nonce)?;
        let nonce: [u8; NONCE_SIZE] =
            nonce_bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidNonceLength {
                    expected: NONCE_SIZE,
                    actual: nonce_bytes.len(),
                })?;

        let ciphertext = decode_base58("data", ciphertext)?;

        Ok(Self { nonce, ciphertext })
    }
}

fn decode_base58(field: &'static str, encoded: &str) -> CryptoResult<Vec<u8>> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CryptoError::InvalidEncoding {
            field,
            reason: e.to_string(),
        })
}

fn cipher(secret: &SharedSecret) -> CryptoResult<XSalsa20Poly1305> {
    XSalsa20Poly1305::new_from_slice(secret.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Seal raw bytes under a fresh random nonce
pub(crate) fn seal(plaintext: &[u8], secret: &SharedSecret) -> CryptoResult<Envelope> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;

    let ciphertext = cipher(secret)?
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(Envelope { nonce, ciphertext })
}

/// Open a box, failing closed on any authentication error
pub(crate) fn open(envelope: &Envelope, secret: &SharedSecret) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if envelope.ciphertext.len() < TAG_SIZE {
        debug!("Box shorter than its tag ({} bytes)", envelope.ciphertext.len());
        return Err(CryptoError::DecryptionFailed);
    }

    let plaintext = cipher(secret)
        .map_err(|_| CryptoError::DecryptionFailed)?
        .decrypt(
            GenericArray::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| {
            debug!("Box failed authentication");
            CryptoError::DecryptionFailed
        })?;

    Ok(Zeroizing::new(plaintext))
}

/// Serialize `payload` to JSON and seal it for the wallet
pub fn encrypt<T: Serialize + ?Sized>(
    payload: &T,
    secret: &SharedSecret,
) -> CryptoResult<Envelope> {
    let plaintext =
        Zeroizing::new(serde_json::to_vec(payload).map_err(CryptoError::Serialization)?);
    seal(&plaintext, secret)
}

/// Open a wallet box and parse its JSON body into `T`
///
/// Authentication failures surface as [`CryptoError::DecryptionFailed`];
/// a valid box whose contents do not parse as `T` surfaces as
/// [`CryptoError::MalformedJson`].
pub fn decrypt<T: DeserializeOwned>(envelope: &Envelope, secret: &SharedSecret) -> CryptoResult<T> {
    let plaintext = open(envelope, secret)?;
    serde_json::from_slice(&plaintext).map_err(CryptoError::MalformedJson)
}

/// Open a wallet box without a schema
pub fn decrypt_value(
    envelope: &Envelope,
    secret: &SharedSecret,
) -> CryptoResult<serde_json::Value> {
    decrypt(envelope, secret)
}
