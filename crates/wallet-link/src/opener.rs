//! Handing links to the operating system

use std::process::Stdio;

use link_protocol::{ProtocolError, ProtocolResult};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use url::Url;

/// Fire-and-forget URL opener
///
/// Returning `Ok` only means the link was handed off; the wallet's answer
/// arrives later as an inbound deep link.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &Url) -> ProtocolResult<()>;
}

/// Opens links with the platform's default handler
///
/// Must be used from within a tokio runtime, which reaps the handler process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(url: &Url) -> Command {
        #[cfg(target_os = "macos")]
        let mut cmd = Command::new("open");
        #[cfg(target_os = "windows")]
        let mut cmd = {
            let mut cmd = Command::new("rundll32");
            cmd.arg("url.dll,FileProtocolHandler");
            cmd
        };
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut cmd = Command::new("xdg-open");

        cmd.arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl LinkOpener for SystemOpener {
    fn open(&self, url: &Url) -> ProtocolResult<()> {
        let runtime = Handle::try_current()
            .map_err(|e| ProtocolError::OpenFailed(format!("no tokio runtime: {}", e)))?;

        let mut child = Self::command(url).spawn().map_err(|e| {
            error!("Failed to launch URL handler: {}", e);
            ProtocolError::OpenFailed(e.to_string())
        })?;

        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!("URL handler exited with {}", status),
                Ok(_) => {}
                Err(e) => warn!("Failed to reap URL handler: {}", e),
            }
        });

        debug!("Handed {} link to system handler", url.path());
        Ok(())
    }
}

/// Forwards links to a channel, for hosts that open them themselves
#[derive(Debug, Clone)]
pub struct ChannelOpener {
    tx: mpsc::UnboundedSender<Url>,
}

impl ChannelOpener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Url>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LinkOpener for ChannelOpener {
    fn open(&self, url: &Url) -> ProtocolResult<()> {
        self.tx
            .send(url.clone())
            .map_err(|_| ProtocolError::OpenFailed("link receiver dropped".to_string()))
    }
}
