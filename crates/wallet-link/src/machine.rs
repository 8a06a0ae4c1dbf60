//! Session state machine
//!
//! Owns the ephemeral key pair and the established session, and moves
//! between states in response to local requests and wallet redirects. All
//! mutation happens through `&mut self`, so a single owner (the router task)
//! serializes every transition.

use std::fmt;
use std::sync::Arc;

use crypto_session::{derive_shared_secret, EncryptionPublicKey, KeyPair, SharedSecret};
use link_protocol::{
    CallbackKind, ConnectResponse, DeepLinkEvent, ProtocolError, ProtocolResult, RequestKind,
    SessionState, SignAndSendPayload, SignResponse, WalletResponse, CONNECT_ENDPOINT,
    SIGN_AND_SEND_ENDPOINT,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    build_connect_link, build_sign_and_send_link, connect_callback, parser, sign_callback,
    LinkConfig, LinkOpener, MemoInstruction, SignableTransaction,
};

/// Established session with the wallet
///
/// Only ever constructed complete; the machine stores it in one assignment.
pub struct Session {
    token: String,
    wallet_public_key: String,
    wallet_encryption_key: EncryptionPublicKey,
    shared_secret: SharedSecret,
}

impl Session {
    /// Opaque token the wallet issued on connect
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Wallet account address
    pub fn wallet_public_key(&self) -> &str {
        &self.wallet_public_key
    }

    /// Wallet's ephemeral encryption key from the handshake
    pub fn wallet_encryption_key(&self) -> &EncryptionPublicKey {
        &self.wallet_encryption_key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("wallet_public_key", &self.wallet_public_key)
            .field("wallet_encryption_key", &self.wallet_encryption_key)
            .finish_non_exhaustive()
    }
}

/// Outcome of a wallet redirect or an expired request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { wallet_public_key: String },
    Signed { signature: String },
    Failed { request: RequestKind, error: ProtocolError },
}

#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    kind: RequestKind,
    deadline: Option<Instant>,
}

/// Session state machine
pub struct SessionMachine {
    config: LinkConfig,
    opener: Arc<dyn LinkOpener>,
    keypair: Option<KeyPair>,
    session: Option<Session>,
    pending: Option<PendingRequest>,
}

impl SessionMachine {
    /// Create a disconnected machine
    pub fn new(config: LinkConfig, opener: Arc<dyn LinkOpener>) -> Self {
        Self {
            config,
            opener,
            keypair: None,
            session: None,
            pending: None,
        }
    }

    /// Current state, derived from what the machine holds
    pub fn state(&self) -> SessionState {
        match (&self.session, self.pending.as_ref().map(|p| p.kind)) {
            (None, None) => SessionState::Disconnected,
            (_, Some(RequestKind::Connect)) => SessionState::HandshakePending,
            (Some(_), Some(RequestKind::SignAndSend)) => SessionState::SignPending,
            (Some(_), None) => SessionState::Connected,
            // A sign request is only issued from an established session
            (None, Some(RequestKind::SignAndSend)) => SessionState::Disconnected,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Public half of the current ephemeral key pair
    pub fn public_key(&self) -> Option<EncryptionPublicKey> {
        self.keypair.as_ref().map(KeyPair::public_key)
    }

    /// Deadline of the outstanding request, if it has one
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|p| p.deadline)
    }

    fn start_pending(&mut self, kind: RequestKind) -> Uuid {
        let id = Uuid::new_v4();
        let deadline = self.config.request_timeout.map(|t| Instant::now() + t);
        self.pending = Some(PendingRequest { id, kind, deadline });
        id
    }

    /// Start a handshake with a fresh key pair
    ///
    /// Supersedes any outstanding handshake and discards an existing session.
    pub fn request_connect(&mut self) -> ProtocolResult<Url> {
        let previous = self.state();
        if previous != SessionState::Disconnected {
            info!("Superseding {:?} with a new connect request", previous);
        }
        self.reset();

        let keypair = KeyPair::generate()?;
        let endpoint = self.config.wallet_endpoint(CONNECT_ENDPOINT)?;
        let redirect = self.config.redirect_link(&CallbackKind::Connect)?;
        let url = build_connect_link(
            &endpoint,
            &keypair.public_key(),
            self.config.cluster,
            &redirect,
            self.config.app_url.as_deref(),
        );

        self.keypair = Some(keypair);
        let id = self.start_pending(RequestKind::Connect);

        if let Err(e) = self.opener.open(&url) {
            self.reset();
            return Err(e);
        }

        info!("Connect request {} handed to wallet", id);
        Ok(url)
    }

    /// Ask the wallet to sign and submit `transaction`
    ///
    /// The fee payer is set to the connected wallet and `memo`, when given, is
    /// appended as a memo instruction. Memos are public on chain.
    pub fn request_sign<T: SignableTransaction + ?Sized>(
        &mut self,
        transaction: &mut T,
        memo: Option<&str>,
    ) -> ProtocolResult<Url> {
        let state = self.state();
        let (Some(session), Some(keypair)) = (&self.session, &self.keypair) else {
            return Err(ProtocolError::NoActiveSession);
        };
        if state != SessionState::Connected {
            return Err(ProtocolError::InvalidStateTransition {
                from: state,
                to: SessionState::SignPending,
            });
        }

        transaction.set_fee_payer(session.wallet_public_key())?;
        if let Some(memo) = memo {
            warn!("Attaching public memo ({} bytes) to transaction", memo.len());
            transaction.attach_memo(MemoInstruction::new(memo)?)?;
        }

        let payload = SignAndSendPayload {
            session: session.token.clone(),
            transaction: bs58::encode(transaction.serialize_unsigned()?).into_string(),
        };
        let endpoint = self.config.wallet_endpoint(SIGN_AND_SEND_ENDPOINT)?;
        let redirect = self.config.redirect_link(&CallbackKind::SignAndSend)?;
        let url = build_sign_and_send_link(
            &endpoint,
            &payload,
            &keypair.public_key(),
            &session.shared_secret,
            &redirect,
        )?;

        let id = self.start_pending(RequestKind::SignAndSend);

        if let Err(e) = self.opener.open(&url) {
            self.pending = None;
            return Err(e);
        }

        info!("Sign request {} handed to wallet", id);
        Ok(url)
    }

    /// Process one inbound deep link
    ///
    /// Returns `None` when the link does not answer the outstanding request;
    /// such links are logged and otherwise ignored.
    pub fn handle_link(&mut self, raw: &str) -> Option<SessionEvent> {
        let event = match parser::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring unparseable deep link: {}", e);
                return None;
            }
        };

        let expected = self.pending.as_ref().map(|p| p.kind.callback());
        let callback = event.callback();
        if expected.as_ref() != Some(&callback) {
            debug!(
                "Ignoring {} link in state {:?}",
                callback.name(),
                self.state()
            );
            return None;
        }

        match callback {
            CallbackKind::Connect => Some(self.complete_connect(&event)),
            CallbackKind::SignAndSend => Some(self.complete_sign(&event)),
            CallbackKind::Unknown(_) => None,
        }
    }

    fn complete_connect(&mut self, event: &DeepLinkEvent) -> SessionEvent {
        let pending = self.pending.take();
        let result = self.finish_handshake(event);

        match result {
            Ok(session) => {
                let wallet_public_key = session.wallet_public_key.clone();
                self.session = Some(session);
                if let Some(pending) = pending {
                    info!("Connect request {} completed: {}", pending.id, wallet_public_key);
                }
                SessionEvent::Connected { wallet_public_key }
            }
            Err(error) => {
                self.reset();
                warn!("Connect failed: {}", error);
                SessionEvent::Failed {
                    request: RequestKind::Connect,
                    error,
                }
            }
        }
    }

    fn finish_handshake(&self, event: &DeepLinkEvent) -> ProtocolResult<Session> {
        let callback = connect_callback(event)?;
        let keypair = self.keypair.as_ref().ok_or(ProtocolError::NoActiveSession)?;

        let shared_secret = derive_shared_secret(keypair, &callback.wallet_encryption_key)?;
        let response: ConnectResponse =
            crypto_session::decrypt(&callback.envelope, &shared_secret)?;
        response.validate()?;

        Ok(Session {
            token: response.session,
            wallet_public_key: response.public_key,
            wallet_encryption_key: callback.wallet_encryption_key,
            shared_secret,
        })
    }

    fn complete_sign(&mut self, event: &DeepLinkEvent) -> SessionEvent {
        let pending = self.pending.take();

        match self.finish_sign(event) {
            Ok(signature) => {
                if let Some(pending) = pending {
                    info!("Sign request {} completed", pending.id);
                }
                SessionEvent::Signed { signature }
            }
            Err(error) => {
                warn!("Sign request failed, session kept: {}", error);
                SessionEvent::Failed {
                    request: RequestKind::SignAndSend,
                    error,
                }
            }
        }
    }

    fn finish_sign(&self, event: &DeepLinkEvent) -> ProtocolResult<String> {
        let envelope = sign_callback(event)?;
        let session = self.session.as_ref().ok_or(ProtocolError::NoActiveSession)?;

        let response: SignResponse = crypto_session::decrypt(&envelope, &session.shared_secret)?;
        response.validate()?;
        Ok(response.signature)
    }

    /// Abandon the outstanding request if its deadline has passed
    pub fn expire(&mut self, now: Instant) -> Option<SessionEvent> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }

        let pending = self.pending.take()?;
        if pending.kind == RequestKind::Connect {
            self.reset();
        }

        warn!("{} request {} timed out", pending.kind, pending.id);
        Some(SessionEvent::Failed {
            request: pending.kind,
            error: ProtocolError::Timeout(pending.kind),
        })
    }

    /// Drop the session, key pair and any outstanding request
    pub fn clear(&mut self) {
        if self.state() != SessionState::Disconnected {
            info!("Clearing session from {:?}", self.state());
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.pending = None;
        self.session = None;
        self.keypair = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::testing::{dapp_key_of, query, MockTransaction, TestWallet};
    use crate::{ChannelOpener, SerializedTransaction};

    use super::*;

    type Opened = tokio::sync::mpsc::UnboundedReceiver<Url>;

    fn new_machine(config: LinkConfig) -> (SessionMachine, Opened) {
        let (opener, rx) = ChannelOpener::new();
        (SessionMachine::new(config, Arc::new(opener)), rx)
    }

    fn connected(wallet: &TestWallet) -> (SessionMachine, Opened) {
        let (mut machine, rx) = new_machine(LinkConfig::default());
        let link = machine.request_connect().unwrap();
        let redirect = wallet.approve_connect(&link, "Abc123", "sess-1");
        assert!(matches!(machine.handle_link(&redirect), Some(SessionEvent::Connected { .. })));
        (machine, rx)
    }

    #[test]
    fn test_connect_scenario() {
        let (mut machine, mut opened) = new_machine(LinkConfig::default());
        assert_eq!(machine.state(), SessionState::Disconnected);

        let link = machine.request_connect().unwrap();
        assert_eq!(machine.state(), SessionState::HandshakePending);
        assert_eq!(opened.try_recv().unwrap(), link);
        assert!(link.as_str().starts_with("https://phantom.app/ul/v1/connect?"));
        assert_eq!(Some(dapp_key_of(&link)), machine.public_key());
        assert_eq!(query(&link)["redirect_link"], "walletlink://onConnect");

        let wallet = TestWallet::new();
        let redirect = wallet.approve_connect(&link, "Abc123", "sess-1");
        assert_eq!(
            machine.handle_link(&redirect),
            Some(SessionEvent::Connected {
                wallet_public_key: "Abc123".to_string()
            })
        );

        assert_eq!(machine.state(), SessionState::Connected);
        let session = machine.session().unwrap();
        assert_eq!(session.wallet_public_key(), "Abc123");
        assert_eq!(session.token(), "sess-1");
        assert_eq!(session.wallet_encryption_key(), &wallet.keypair.public_key());
    }

    #[test]
    fn test_sign_scenario() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);

        let tx_bytes = vec![9u8, 8, 7, 6, 5];
        let link = machine
            .request_sign(&mut SerializedTransaction(tx_bytes.clone()), None)
            .unwrap();
        assert_eq!(machine.state(), SessionState::SignPending);
        assert!(link.path().ends_with("/signAndSendTransaction"));
        assert_eq!(query(&link)["redirect_link"], "walletlink://onSignAndSendTransaction");

        let payload = wallet.open_sign_link(&link);
        assert_eq!(
            payload,
            SignAndSendPayload {
                session: "sess-1".to_string(),
                transaction: bs58::encode(&tx_bytes).into_string(),
            }
        );

        let redirect = wallet.approve_sign(&link, "5sig");
        assert_eq!(
            machine.handle_link(&redirect),
            Some(SessionEvent::Signed {
                signature: "5sig".to_string()
            })
        );
        assert_eq!(machine.state(), SessionState::Connected);

        // The session survives for another round
        let link = machine
            .request_sign(&mut SerializedTransaction(vec![1]), None)
            .unwrap();
        assert_eq!(wallet.open_sign_link(&link).session, "sess-1");
    }

    #[test]
    fn test_sign_sets_fee_payer_and_memo() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);

        let mut tx = MockTransaction::default();
        let link = machine.request_sign(&mut tx, Some("fit:8")).unwrap();

        assert_eq!(tx.fee_payer.as_deref(), Some("Abc123"));
        assert_eq!(tx.memos, vec![MemoInstruction::new("fit:8").unwrap()]);
        let sent = bs58::decode(wallet.open_sign_link(&link).transaction)
            .into_vec()
            .unwrap();
        assert_eq!(sent, tx.serialize_unsigned().unwrap());
    }

    #[test]
    fn test_memo_on_serialized_bytes_leaves_state() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);

        let result = machine.request_sign(&mut SerializedTransaction(vec![1]), Some("note"));
        assert!(matches!(result, Err(ProtocolError::InvalidParameter { name: "memo", .. })));
        assert_eq!(machine.state(), SessionState::Connected);
    }

    #[test]
    fn test_sign_without_session() {
        let (mut machine, mut opened) = new_machine(LinkConfig::default());
        assert_eq!(
            machine.request_sign(&mut SerializedTransaction(vec![1]), None),
            Err(ProtocolError::NoActiveSession)
        );

        machine.request_connect().unwrap();
        let _ = opened.try_recv();
        assert_eq!(
            machine.request_sign(&mut SerializedTransaction(vec![1]), None),
            Err(ProtocolError::NoActiveSession)
        );
        assert!(opened.try_recv().is_err());
    }

    #[test]
    fn test_second_sign_while_pending_rejected() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);
        machine.request_sign(&mut SerializedTransaction(vec![1]), None).unwrap();

        assert_eq!(
            machine.request_sign(&mut SerializedTransaction(vec![2]), None),
            Err(ProtocolError::InvalidStateTransition {
                from: SessionState::SignPending,
                to: SessionState::SignPending,
            })
        );
        assert_eq!(machine.state(), SessionState::SignPending);
    }

    #[test]
    fn test_connect_rejected_by_user() {
        let (mut machine, _rx) = new_machine(LinkConfig::default());
        machine.request_connect().unwrap();

        let redirect = TestWallet::reject("onConnect", "4001", "User rejected");
        assert_eq!(
            machine.handle_link(&redirect),
            Some(SessionEvent::Failed {
                request: RequestKind::Connect,
                error: ProtocolError::RemoteErrorCode {
                    code: 4001,
                    message: "User rejected".to_string()
                },
            })
        );
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.session().is_none());
        assert!(machine.public_key().is_none());
    }

    #[test]
    fn test_connect_with_wrong_key_leaves_no_session() {
        let (mut machine, _rx) = new_machine(LinkConfig::default());
        let link = machine.request_connect().unwrap();

        // Sealed for a different dapp key than the one we sent
        let wallet = TestWallet::new();
        let mut other_link = link.clone();
        let stranger = KeyPair::generate().unwrap().public_key().to_base58();
        other_link
            .query_pairs_mut()
            .clear()
            .append_pair("dapp_encryption_public_key", &stranger);
        let redirect = wallet.approve_connect(&other_link, "Abc123", "sess-1");

        assert_eq!(
            machine.handle_link(&redirect),
            Some(SessionEvent::Failed {
                request: RequestKind::Connect,
                error: ProtocolError::DecryptionFailure,
            })
        );
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_connect_missing_parameter() {
        let (mut machine, _rx) = new_machine(LinkConfig::default());
        machine.request_connect().unwrap();

        let event = machine.handle_link("walletlink://onConnect?data=abc&nonce=def");
        assert_eq!(
            event,
            Some(SessionEvent::Failed {
                request: RequestKind::Connect,
                error: ProtocolError::MissingParameter("phantom_encryption_public_key"),
            })
        );
        assert_eq!(machine.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_sign_failure_keeps_session() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);
        machine.request_sign(&mut SerializedTransaction(vec![1]), None).unwrap();

        let redirect = TestWallet::reject("onSignAndSendTransaction", "4001", "User rejected");
        assert!(matches!(
            machine.handle_link(&redirect),
            Some(SessionEvent::Failed {
                request: RequestKind::SignAndSend,
                error: ProtocolError::RemoteErrorCode { code: 4001, .. },
            })
        ));
        assert_eq!(machine.state(), SessionState::Connected);
        assert_eq!(machine.session().unwrap().token(), "sess-1");

        machine.request_sign(&mut SerializedTransaction(vec![1]), None).unwrap();
        let garbage = "walletlink://onSignAndSendTransaction?data=3yZe7d&nonce=3yZe7d";
        assert!(matches!(
            machine.handle_link(garbage),
            Some(SessionEvent::Failed { request: RequestKind::SignAndSend, .. })
        ));
        assert_eq!(machine.state(), SessionState::Connected);
    }

    #[test]
    fn test_unrelated_links_ignored() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = new_machine(LinkConfig::default());

        // Nothing outstanding
        assert_eq!(machine.handle_link("walletlink://onConnect?errorCode=4001"), None);
        assert_eq!(machine.state(), SessionState::Disconnected);

        let link = machine.request_connect().unwrap();
        assert_eq!(machine.handle_link("walletlink://settings"), None);
        assert_eq!(machine.handle_link("not a url"), None);
        assert_eq!(
            machine.handle_link("walletlink://onSignAndSendTransaction?data=a&nonce=b"),
            None
        );
        assert_eq!(machine.state(), SessionState::HandshakePending);

        let redirect = wallet.approve_connect(&link, "Abc123", "sess-1");
        assert!(machine.handle_link(&redirect).is_some());

        // A replayed connect redirect no longer matches anything
        assert_eq!(machine.handle_link(&redirect), None);
        assert_eq!(machine.state(), SessionState::Connected);
    }

    #[test]
    fn test_connect_supersedes_pending_handshake() {
        let (mut machine, _rx) = new_machine(LinkConfig::default());
        let first = machine.request_connect().unwrap();
        let second = machine.request_connect().unwrap();
        assert_ne!(dapp_key_of(&first), dapp_key_of(&second));
        assert_eq!(machine.state(), SessionState::HandshakePending);

        // The answer to the stale request cannot be opened with the new key
        let wallet = TestWallet::new();
        let stale = wallet.approve_connect(&first, "Abc123", "sess-1");
        assert!(matches!(
            machine.handle_link(&stale),
            Some(SessionEvent::Failed {
                error: ProtocolError::DecryptionFailure,
                ..
            })
        ));
        assert_eq!(machine.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_reconnect_discards_existing_session() {
        let wallet = TestWallet::new();
        let (mut machine, _rx) = connected(&wallet);
        machine.request_connect().unwrap();
        assert_eq!(machine.state(), SessionState::HandshakePending);
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_clear_from_every_state() {
        let wallet = TestWallet::new();

        let (mut machine, _rx) = connected(&wallet);
        machine.clear();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.public_key().is_none());

        let (mut machine, _rx) = connected(&wallet);
        machine.request_sign(&mut SerializedTransaction(vec![1]), None).unwrap();
        machine.clear();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.session().is_none());

        let (mut machine, _rx) = new_machine(LinkConfig::default());
        machine.request_connect().unwrap();
        machine.clear();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert_eq!(machine.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_returns_to_prior_state() {
        let config = LinkConfig::default().with_request_timeout(Some(Duration::from_secs(30)));
        let (mut machine, _rx) = new_machine(config);
        machine.request_connect().unwrap();

        assert_eq!(machine.expire(Instant::now()), None);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            machine.expire(Instant::now()),
            Some(SessionEvent::Failed {
                request: RequestKind::Connect,
                error: ProtocolError::Timeout(RequestKind::Connect),
            })
        );
        assert_eq!(machine.state(), SessionState::Disconnected);

        let wallet = TestWallet::new();
        let link = machine.request_connect().unwrap();
        machine.handle_link(&wallet.approve_connect(&link, "Abc123", "sess-1"));
        assert_eq!(machine.deadline(), None);

        machine.request_sign(&mut SerializedTransaction(vec![1]), None).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(
            machine.expire(Instant::now()),
            Some(SessionEvent::Failed {
                error: ProtocolError::Timeout(RequestKind::SignAndSend),
                ..
            })
        ));
        assert_eq!(machine.state(), SessionState::Connected);
    }

    #[test]
    fn test_no_timeout_configured() {
        let config = LinkConfig::default().with_request_timeout(None);
        let (mut machine, _rx) = new_machine(config);
        machine.request_connect().unwrap();
        assert_eq!(machine.deadline(), None);
        assert_eq!(machine.expire(Instant::now()), None);
    }

    #[test]
    fn test_opener_failure_reverts() {
        let (mut machine, rx) = new_machine(LinkConfig::default());
        drop(rx);
        assert!(matches!(machine.request_connect(), Err(ProtocolError::OpenFailed(_))));
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.public_key().is_none());
    }
}
