//! Command-line entry points for agentcomm.
//!
//! One binary drives every process in the system:
//!
//! - `agentcomm agent <id>`: run an agent's dispatch loop (and card server)
//! - `agentcomm registry`: run the discovery/liveness probe loop
//! - `agentcomm send ...`: deposit a task request, optionally wait for the reply
//! - `agentcomm inbox <id>`: show a pending envelope without claiming it
//! - `agentcomm agents`: show the registry's last published snapshot

pub mod agent;
pub mod discovery;
pub mod inspect;
pub mod send;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentcomm_config::Config;

pub use send::SendArgs;

#[derive(Parser, Debug)]
#[command(
    name = "agentcomm",
    version,
    about = "Mailbox-based task dispatch between autonomous agents"
)]
pub struct Cli {
    /// Configuration file (defaults to ./agentcomm.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the mailbox directory
    #[arg(long, global = true)]
    pub mailbox_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an agent's dispatch loop
    Agent {
        /// Agent identity (names its mailbox)
        id: String,

        /// Do not serve the agent card even if `card_addr` is configured
        #[arg(long)]
        no_card: bool,
    },

    /// Run the agent registry probe loop
    Registry {
        /// Probe once, print the snapshot and exit
        #[arg(long)]
        once: bool,
    },

    /// Deposit a task request into an agent's mailbox
    Send(SendArgs),

    /// Show the pending envelope in an agent's mailbox without claiming it
    Inbox {
        /// Agent identity
        id: String,
    },

    /// Show the registry's last published snapshot
    Agents,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.mailbox_dir {
        config.mailbox.dir = dir;
    }

    match cli.command {
        Commands::Agent { id, no_card } => agent::run_agent(&config, &id, !no_card).await,
        Commands::Registry { once } => discovery::run_registry(&config, once).await,
        Commands::Send(args) => send::run_send(&config, &args).await.map(|_| ()),
        Commands::Inbox { id } => inspect::show_inbox(&config, &id).await,
        Commands::Agents => inspect::show_agents(&config).await,
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "agentcomm=debug" } else { "agentcomm=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Token cancelled on Ctrl-C.
pub(crate) fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            trigger.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agent() {
        let cli = Cli::try_parse_from(["agentcomm", "agent", "claude", "--no-card"]).unwrap();
        match cli.command {
            Commands::Agent { id, no_card } => {
                assert_eq!(id, "claude");
                assert!(no_card);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "agentcomm",
            "registry",
            "--once",
            "--config",
            "custom.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Registry { once: true }));
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "agentcomm",
            "send",
            "--from",
            "gemini",
            "--to",
            "claude",
            "--code-path",
            "src/utils/math.js",
            "--instruction",
            "simplify",
            "--id",
            "1",
            "--wait",
            "30",
        ])
        .unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.to, "claude");
        assert_eq!(args.id.as_deref(), Some("1"));
        assert_eq!(args.wait, Some(30));
        assert_eq!(args.method, "RequestRefactor");
    }

    #[test]
    fn test_send_requires_recipient() {
        assert!(Cli::try_parse_from(["agentcomm", "send", "--from", "gemini"]).is_err());
    }
}
