//! Session state and request vocabulary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Initial state, no session and no request outstanding
    Disconnected,
    /// Connect link handed to the wallet, waiting for its redirect
    HandshakePending,
    /// Shared secret and session token established
    Connected,
    /// Sign-and-send link handed to the wallet, waiting for its redirect
    SignPending,
}

impl SessionState {
    /// Whether a fully established session exists in this state
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Connected | Self::SignPending)
    }

    /// Whether a request is waiting on a wallet redirect
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::HandshakePending | Self::SignPending)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Kind of request handed to the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Connect,
    SignAndSend,
}

impl RequestKind {
    /// Name of the redirect callback the wallet answers this request on
    pub fn callback(&self) -> CallbackKind {
        match self {
            Self::Connect => CallbackKind::Connect,
            Self::SignAndSend => CallbackKind::SignAndSend,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::SignAndSend => write!(f, "signAndSendTransaction"),
        }
    }
}

/// Redirect callback the wallet invokes on the way back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackKind {
    Connect,
    SignAndSend,
    /// Any other link routed to the same handler
    Unknown(String),
}

impl CallbackKind {
    pub const CONNECT_NAME: &'static str = "onConnect";
    pub const SIGN_AND_SEND_NAME: &'static str = "onSignAndSendTransaction";

    /// Classify a callback name (last path segment or host of the redirect)
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case(Self::CONNECT_NAME) {
            Self::Connect
        } else if name.eq_ignore_ascii_case(Self::SIGN_AND_SEND_NAME) {
            Self::SignAndSend
        } else {
            Self::Unknown(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Connect => Self::CONNECT_NAME,
            Self::SignAndSend => Self::SIGN_AND_SEND_NAME,
            Self::Unknown(name) => name,
        }
    }
}

/// Solana cluster the wallet should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Testnet,
    Devnet,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainnetBeta => "mainnet-beta",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::Devnet
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet-beta" | "mainnet" => Ok(Self::MainnetBeta),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            other => Err(format!("unknown cluster: {}", other)),
        }
    }
}
