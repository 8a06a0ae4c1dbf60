//! Session router
//!
//! One task owns the [`SessionMachine`] and serializes everything that can
//! touch it: local commands, deep links delivered by the OS, and the
//! deadline of the outstanding request.

use std::sync::Arc;

use link_protocol::{ProtocolError, ProtocolResult, SessionState};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::{SessionEvent, SessionMachine, SignableTransaction, CHANNEL_CAPACITY};

/// Read-only view of the session, refreshed after every step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub wallet_public_key: Option<String>,
}

enum Command {
    Connect {
        reply: oneshot::Sender<ProtocolResult<Url>>,
    },
    Sign {
        transaction: Box<dyn SignableTransaction>,
        memo: Option<String>,
        reply: oneshot::Sender<ProtocolResult<Url>>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

/// Handle for the OS deep-link callback
///
/// Clone it into whatever registers for the app's URL scheme, including the
/// launch URL if the process was started by a redirect.
#[derive(Debug, Clone)]
pub struct DeepLinkSender {
    tx: mpsc::Sender<String>,
}

impl DeepLinkSender {
    pub async fn deliver(&self, url: impl Into<String>) -> ProtocolResult<()> {
        self.tx
            .send(url.into())
            .await
            .map_err(|_| ProtocolError::RouterClosed)
    }

    /// Non-blocking delivery for synchronous callbacks
    ///
    /// Fails with [`ProtocolError::QueueFull`] while the router is behind;
    /// the link is not queued and may be delivered again.
    pub fn try_deliver(&self, url: impl Into<String>) -> ProtocolResult<()> {
        self.tx.try_send(url.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Deep-link queue full, rejecting link");
                ProtocolError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => ProtocolError::RouterClosed,
        })
    }
}

/// Session router handle
#[derive(Clone)]
pub struct LinkRouter {
    commands: mpsc::Sender<Command>,
    links: DeepLinkSender,
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl LinkRouter {
    /// Spawn the router task
    ///
    /// Returns the handle and the stream of session events. The task stops
    /// once every handle is dropped.
    pub fn spawn(machine: SessionMachine) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (link_tx, link_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let snapshot = Arc::new(RwLock::new(SessionSnapshot::default()));

        tokio::spawn(run(machine, command_rx, link_rx, event_tx, snapshot.clone()));

        let router = Self {
            commands: command_tx,
            links: DeepLinkSender { tx: link_tx },
            snapshot,
        };
        (router, event_rx)
    }

    /// Sender for inbound deep links
    pub fn deep_links(&self) -> DeepLinkSender {
        self.links.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.read().state
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ProtocolResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ProtocolError::RouterClosed)?;
        response.await.map_err(|_| ProtocolError::RouterClosed)
    }

    /// Open the wallet's connect link; the outcome arrives as a [`SessionEvent`]
    pub async fn connect(&self) -> ProtocolResult<Url> {
        self.request(|reply| Command::Connect { reply }).await?
    }

    /// Open a sign-and-send link for `transaction`
    pub async fn sign<T: SignableTransaction + 'static>(
        &self,
        transaction: T,
        memo: Option<String>,
    ) -> ProtocolResult<Url> {
        self.request(|reply| Command::Sign {
            transaction: Box::new(transaction),
            memo,
            reply,
        })
        .await?
    }

    /// Discard the session and any outstanding request
    pub async fn clear(&self) -> ProtocolResult<()> {
        self.request(|reply| Command::Clear { reply }).await
    }
}

async fn run(
    mut machine: SessionMachine,
    mut commands: mpsc::Receiver<Command>,
    mut links: mpsc::Receiver<String>,
    events: mpsc::Sender<SessionEvent>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
) {
    info!("Session router started");
    publish(&machine, &snapshot);

    loop {
        let deadline = machine.deadline();

        let event = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    // Callers observe the new snapshot as soon as they get a reply
                    let reply = handle_command(&mut machine, command);
                    publish(&machine, &snapshot);
                    reply.send();
                    None
                }
                None => break,
            },

            Some(raw) = links.recv() => machine.handle_link(&raw),

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                machine.expire(Instant::now())
            }
        };

        publish(&machine, &snapshot);

        // The router never waits on the event consumer
        if let Some(event) = event {
            match events.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!("Session event queue full, dropping {:?}", event);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Session event receiver dropped");
                }
            }
        }
    }

    info!("Session router stopped");
}

enum Reply {
    Link(oneshot::Sender<ProtocolResult<Url>>, ProtocolResult<Url>),
    Done(oneshot::Sender<()>),
}

impl Reply {
    fn send(self) {
        // A caller that stopped waiting is not an error
        match self {
            Reply::Link(tx, result) => {
                let _ = tx.send(result);
            }
            Reply::Done(tx) => {
                let _ = tx.send(());
            }
        }
    }
}

fn handle_command(machine: &mut SessionMachine, command: Command) -> Reply {
    match command {
        Command::Connect { reply } => Reply::Link(reply, machine.request_connect()),
        Command::Sign {
            mut transaction,
            memo,
            reply,
        } => Reply::Link(
            reply,
            machine.request_sign(&mut *transaction, memo.as_deref()),
        ),
        Command::Clear { reply } => {
            machine.clear();
            Reply::Done(reply)
        }
    }
}

fn publish(machine: &SessionMachine, snapshot: &RwLock<SessionSnapshot>) {
    let next = SessionSnapshot {
        state: machine.state(),
        wallet_public_key: machine
            .session()
            .map(|s| s.wallet_public_key().to_string()),
    };

    let mut current = snapshot.write();
    if *current != next {
        debug!("Session state: {:?} -> {:?}", current.state, next.state);
        *current = next;
    }
}
