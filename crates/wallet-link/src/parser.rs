//! Inbound redirect parsing

use std::collections::HashMap;

use crypto_session::{EncryptionPublicKey, Envelope};
use link_protocol::{params, DeepLinkEvent, ProtocolError, ProtocolResult};
use url::Url;

/// Split a raw redirect URL into callback name and query parameters
pub fn parse(raw: &str) -> ProtocolResult<DeepLinkEvent> {
    let url = Url::parse(raw.trim()).map_err(|e| ProtocolError::invalid("url", e.to_string()))?;

    let mut query_params = HashMap::new();
    for (key, value) in url.query_pairs() {
        query_params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    Ok(DeepLinkEvent {
        raw_url: raw.to_string(),
        path_segment: callback_name(&url),
        query_params,
    })
}

/// `scheme://onConnect`, `scheme:///onConnect` and `exp://host/--/onConnect`
/// all name the `onConnect` callback
fn callback_name(url: &Url) -> String {
    if url.cannot_be_a_base() {
        return url.path().trim_matches('/').to_string();
    }

    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Parameters of a successful connect redirect
#[derive(Debug, Clone)]
pub struct ConnectCallback {
    pub wallet_encryption_key: EncryptionPublicKey,
    pub envelope: Envelope,
}

/// Extract the connect parameters, surfacing a wallet error first
pub fn connect_callback(event: &DeepLinkEvent) -> ProtocolResult<ConnectCallback> {
    if let Some(error) = event.remote_error() {
        return Err(error);
    }

    let wallet_key = event.require(params::WALLET_ENCRYPTION_PUBLIC_KEY)?;
    let data = event.require(params::DATA)?;
    let nonce = event.require(params::NONCE)?;

    let wallet_encryption_key =
        EncryptionPublicKey::from_base58(params::WALLET_ENCRYPTION_PUBLIC_KEY, wallet_key)?;
    let envelope = Envelope::from_base58(nonce, data)?;

    Ok(ConnectCallback {
        wallet_encryption_key,
        envelope,
    })
}

/// Extract the sealed response of a sign-and-send redirect
pub fn sign_callback(event: &DeepLinkEvent) -> ProtocolResult<Envelope> {
    if let Some(error) = event.remote_error() {
        return Err(error);
    }

    let data = event.require(params::DATA)?;
    let nonce = event.require(params::NONCE)?;

    Ok(Envelope::from_base58(nonce, data)?)
}
