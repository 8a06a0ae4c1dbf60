//! Link configuration

use std::time::Duration;

use link_protocol::{CallbackKind, Cluster, ProtocolError, ProtocolResult, DEFAULT_WALLET_BASE_URL};
use url::Url;

/// Default time a request may wait for its wallet redirect
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default scheme prefix the wallet redirects back to
pub const DEFAULT_REDIRECT_PREFIX: &str = "walletlink://";

/// Link configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Wallet universal-link base, e.g. `https://phantom.app/ul/v1/`
    pub wallet_base_url: String,
    /// Cluster requested on connect
    pub cluster: Cluster,
    /// Optional dapp URL the wallet shows the user on connect
    pub app_url: Option<String>,
    /// Prefix of our registered redirect links; the callback name is appended
    pub redirect_prefix: String,
    /// Deadline for a pending request; `None` waits forever
    pub request_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            wallet_base_url: DEFAULT_WALLET_BASE_URL.to_string(),
            cluster: Cluster::Devnet,
            app_url: None,
            redirect_prefix: DEFAULT_REDIRECT_PREFIX.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet_base_url(mut self, url: impl Into<String>) -> Self {
        self.wallet_base_url = url.into();
        self
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    pub fn with_redirect_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.redirect_prefix = prefix.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Absolute URL of a wallet endpoint (`connect`, `signAndSendTransaction`)
    pub fn wallet_endpoint(&self, endpoint: &str) -> ProtocolResult<Url> {
        let mut base = self.wallet_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        let base = Url::parse(&base)
            .map_err(|e| ProtocolError::invalid("wallet_base_url", e.to_string()))?;
        if !matches!(base.scheme(), "https" | "http") {
            return Err(ProtocolError::invalid(
                "wallet_base_url",
                format!("unsupported scheme: {}", base.scheme()),
            ));
        }

        base.join(endpoint)
            .map_err(|e| ProtocolError::invalid("wallet_base_url", e.to_string()))
    }

    /// Redirect link the wallet should answer `callback` on
    pub fn redirect_link(&self, callback: &CallbackKind) -> ProtocolResult<String> {
        let link = format!("{}{}", self.redirect_prefix, callback.name());
        Url::parse(&link).map_err(|e| ProtocolError::invalid("redirect_link", e.to_string()))?;
        Ok(link)
    }

    /// Check every URL the links will carry
    pub fn validate(&self) -> ProtocolResult<()> {
        self.wallet_endpoint(link_protocol::CONNECT_ENDPOINT)?;
        self.redirect_link(&CallbackKind::Connect)?;
        if let Some(app_url) = &self.app_url {
            Url::parse(app_url).map_err(|e| ProtocolError::invalid("app_url", e.to_string()))?;
        }
        Ok(())
    }
}
