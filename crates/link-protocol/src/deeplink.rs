//! Inbound deep-link events

use std::collections::HashMap;

use crate::{params, CallbackKind, ProtocolError, ProtocolResult};

/// Message used when the wallet sends an error code without a message
pub const UNKNOWN_REMOTE_ERROR: &str = "Unknown error";

/// A redirect delivered by the OS, split into its routing parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkEvent {
    pub raw_url: String,
    /// Callback name: last non-empty path segment, or the host for `scheme://name` links
    pub path_segment: String,
    /// Decoded query parameters; on repeated keys the first occurrence wins
    pub query_params: HashMap<String, String>,
}

impl DeepLinkEvent {
    pub fn callback(&self) -> CallbackKind {
        CallbackKind::from_name(&self.path_segment)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Fetch a mandatory, non-empty parameter
    pub fn require(&self, name: &'static str) -> ProtocolResult<&str> {
        match self.param(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ProtocolError::MissingParameter(name)),
        }
    }

    /// The wallet's error response, if this redirect carries one
    ///
    /// Must be checked before any decryption is attempted.
    pub fn remote_error(&self) -> Option<ProtocolError> {
        let code = self.param(params::ERROR_CODE).filter(|c| !c.is_empty())?;

        let code = match code.trim().parse::<i64>() {
            Ok(code) => code,
            Err(_) => {
                return Some(ProtocolError::invalid(
                    params::ERROR_CODE,
                    format!("not an integer: {}", code),
                ));
            }
        };

        let message = self
            .param(params::ERROR_MESSAGE)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_REMOTE_ERROR)
            .to_string();

        Some(ProtocolError::RemoteErrorCode { code, message })
    }
}
