//! Wallet Bridge
//!
//! Terminal host for a wallet link session. Wallet links are opened with the
//! system handler (or printed), and commands or redirect URLs are read from
//! stdin, one per line.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use link_protocol::{Cluster, ProtocolResult, DEFAULT_WALLET_BASE_URL};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use url::Url;
use wallet_link::{
    DeepLinkSender, LinkConfig, LinkOpener, LinkRouter, SerializedTransaction, SessionEvent,
    SessionMachine, SystemOpener, DEFAULT_REDIRECT_PREFIX,
};

#[derive(Debug, Parser)]
#[command(name = "wallet-bridge", version, about = "Deep-link wallet session host")]
struct Args {
    /// Cluster requested on connect
    #[arg(long, env = "WALLET_LINK_CLUSTER", default_value = "devnet")]
    cluster: Cluster,

    /// Wallet universal-link base
    #[arg(long, env = "WALLET_LINK_WALLET_URL", default_value = DEFAULT_WALLET_BASE_URL)]
    wallet_url: String,

    /// Dapp URL shown by the wallet on connect
    #[arg(long, env = "WALLET_LINK_APP_URL")]
    app_url: Option<String>,

    /// Prefix of the redirect links registered for this app
    #[arg(long, env = "WALLET_LINK_REDIRECT_PREFIX", default_value = DEFAULT_REDIRECT_PREFIX)]
    redirect_prefix: String,

    /// Seconds to wait for a wallet redirect, 0 to wait forever
    #[arg(long, env = "WALLET_LINK_TIMEOUT_SECS", default_value_t = 300)]
    timeout_secs: u64,

    /// Print wallet links instead of opening them
    #[arg(long)]
    print_only: bool,

    /// Redirect URL the process was launched with
    initial_link: Option<String>,
}

impl Args {
    fn link_config(&self) -> LinkConfig {
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));

        let config = LinkConfig::new()
            .with_wallet_base_url(self.wallet_url.clone())
            .with_cluster(self.cluster)
            .with_redirect_prefix(self.redirect_prefix.clone())
            .with_request_timeout(timeout);

        match &self.app_url {
            Some(app_url) => config.with_app_url(app_url.clone()),
            None => config,
        }
    }
}

/// Prints links for the user to open on the wallet device
struct PrintOpener;

impl LinkOpener for PrintOpener {
    fn open(&self, url: &Url) -> ProtocolResult<()> {
        println!("open in wallet: {}", url);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_bridge=debug".parse()?)
                .add_directive("wallet_link=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.link_config();
    config.validate()?;

    info!(
        "Starting wallet bridge (cluster {}, redirects to {})",
        config.cluster, config.redirect_prefix
    );

    let opener: Arc<dyn LinkOpener> = if args.print_only {
        Arc::new(PrintOpener)
    } else {
        Arc::new(SystemOpener)
    };

    let (router, mut events) = LinkRouter::spawn(SessionMachine::new(config, opener));
    let inbound = router.deep_links();

    if let Some(link) = args.initial_link {
        inbound.deliver(link).await?;
    }

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&router, &inbound, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },

            Some(event) = events.recv() => report(event),
        }
    }

    router.clear().await?;
    info!("Wallet bridge stopped");
    Ok(())
}

fn print_help() {
    println!("commands: connect | sign <base58 transaction> | clear | state | quit");
    println!("paste a wallet redirect URL to deliver it");
}

/// Returns `false` when the user asked to quit
async fn handle_line(router: &LinkRouter, inbound: &DeepLinkSender, line: &str) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "help" => print_help(),
        "state" => {
            let snapshot = router.snapshot();
            match snapshot.wallet_public_key {
                Some(wallet) => println!("{:?} ({})", snapshot.state, wallet),
                None => println!("{:?}", snapshot.state),
            }
        }
        "connect" => {
            if let Err(e) = router.connect().await {
                println!("connect failed: {}", e);
            }
        }
        "sign" => match bs58::decode(rest.trim()).into_vec() {
            Ok(bytes) => {
                if let Err(e) = router.sign(SerializedTransaction(bytes), None).await {
                    println!("sign failed: {}", e);
                }
            }
            Err(e) => println!("transaction is not base58: {}", e),
        },
        "clear" => {
            if let Err(e) = router.clear().await {
                println!("clear failed: {}", e);
            }
        }
        link if link.contains(':') => {
            if let Err(e) = inbound.deliver(line).await {
                warn!("Failed to deliver deep link: {}", e);
            }
        }
        other => println!("unknown command: {}", other),
    }

    true
}

fn report(event: SessionEvent) {
    match event {
        SessionEvent::Connected { wallet_public_key } => {
            println!("connected: {}", wallet_public_key)
        }
        SessionEvent::Signed { signature } => println!("signed: {}", signature),
        SessionEvent::Failed { request, error } => {
            println!("{} failed: {}", request, error);
            if !error.is_recoverable() {
                warn!("Unrecoverable error, restart required: {}", error);
            }
        }
    }
}
