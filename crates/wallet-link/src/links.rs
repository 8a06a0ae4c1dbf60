//! Outbound wallet links

use crypto_session::{EncryptionPublicKey, SharedSecret};
use link_protocol::{params, Cluster, ProtocolResult, SignAndSendPayload};
use tracing::debug;
use url::Url;

/// Build the connect link that starts the handshake
///
/// `endpoint` is the wallet's `connect` URL; parameters are appended in the
/// order the wallet documents them.
pub fn build_connect_link(
    endpoint: &Url,
    public_key: &EncryptionPublicKey,
    cluster: Cluster,
    redirect_link: &str,
    app_url: Option<&str>,
) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(params::DAPP_ENCRYPTION_PUBLIC_KEY, &public_key.to_base58());
        query.append_pair(params::CLUSTER, cluster.as_str());
        if let Some(app_url) = app_url {
            query.append_pair(params::APP_URL, app_url);
        }
        query.append_pair(params::REDIRECT_LINK, redirect_link);
    }

    debug!("Built connect link for key {}", public_key);
    url
}

/// Build a sign-and-send link carrying `payload` sealed under `secret`
pub fn build_sign_and_send_link(
    endpoint: &Url,
    payload: &SignAndSendPayload,
    public_key: &EncryptionPublicKey,
    secret: &SharedSecret,
    redirect_link: &str,
) -> ProtocolResult<Url> {
    let envelope = crypto_session::encrypt(payload, secret)?;

    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair(params::DAPP_ENCRYPTION_PUBLIC_KEY, &public_key.to_base58())
        .append_pair(params::NONCE, &envelope.nonce_base58())
        .append_pair(params::REDIRECT_LINK, redirect_link)
        .append_pair(params::PAYLOAD, &envelope.ciphertext_base58());

    debug!(
        "Built sign-and-send link ({} byte payload)",
        envelope.ciphertext.len()
    );
    Ok(url)
}
