//! Wallet Link - deep-link session with an external wallet app
//!
//! Builds connect and sign-and-send links, classifies the wallet's redirects,
//! and drives the session state machine on a single router task.

mod config;
mod links;
mod machine;
mod memo;
mod opener;
mod parser;
mod router;

#[cfg(test)]
mod testing;

pub use config::*;
pub use links::*;
pub use machine::*;
pub use memo::*;
pub use opener::*;
pub use parser::*;
pub use router::*;

pub use crypto_session::{EncryptionPublicKey, Envelope, KeyPair, SharedSecret};
pub use link_protocol::{
    Cluster, ProtocolError, ProtocolResult, RequestKind, SessionState, SignResponse,
};

/// Capacity of the command, deep-link and event channels
pub const CHANNEL_CAPACITY: usize = 100;
