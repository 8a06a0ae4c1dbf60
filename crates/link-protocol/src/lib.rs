//! Shared Protocol Definitions for Wallet Link
//!
//! This crate contains the vocabulary shared by every layer of the deep-link
//! wallet protocol: session states, callback names, query parameter names,
//! the JSON bodies that cross the encrypted channel, and the error taxonomy.

mod deeplink;
mod error;
mod payloads;
mod session;

pub use deeplink::*;
pub use error::*;
pub use payloads::*;
pub use session::*;

/// Universal-link base of the wallet, including the protocol version segment
pub const DEFAULT_WALLET_BASE_URL: &str = "https://phantom.app/ul/v1/";

/// Wallet endpoint that starts the handshake
pub const CONNECT_ENDPOINT: &str = "connect";

/// Wallet endpoint that signs and submits a transaction
pub const SIGN_AND_SEND_ENDPOINT: &str = "signAndSendTransaction";

/// Outbound and inbound query parameter names
pub mod params {
    pub const DAPP_ENCRYPTION_PUBLIC_KEY: &str = "dapp_encryption_public_key";
    pub const CLUSTER: &str = "cluster";
    pub const APP_URL: &str = "app_url";
    pub const REDIRECT_LINK: &str = "redirect_link";
    pub const NONCE: &str = "nonce";
    pub const PAYLOAD: &str = "payload";

    pub const WALLET_ENCRYPTION_PUBLIC_KEY: &str = "phantom_encryption_public_key";
    pub const DATA: &str = "data";
    pub const ERROR_CODE: &str = "errorCode";
    pub const ERROR_MESSAGE: &str = "errorMessage";
}
