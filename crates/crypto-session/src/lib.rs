//! Crypto Session - Encrypted channel for deep-link wallet requests
//!
//! Provides X25519 key agreement with NaCl-compatible XSalsa20Poly1305 boxes.
//! The wallet runs `tweetnacl`, so every construction here matches
//! `box.before` / `box.after` / `box.open.after` byte for byte.

mod codec;
mod error;
mod handshake;
mod keypair;

pub use codec::*;
pub use error::*;
pub use handshake::*;
pub use keypair::*;

/// Nonce size for XSalsa20Poly1305 (192 bits / 24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Public key size (256 bits / 32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Shared secret size (256 bits / 32 bytes)
pub const SHARED_SECRET_SIZE: usize = 32;
