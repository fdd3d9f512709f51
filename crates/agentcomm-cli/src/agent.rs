//! `agent <id>`: one agent process.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use agentcomm_config::Config;
use agentcomm_dispatch::{Capability, DispatchLoop, StaticReply};
use agentcomm_mailbox::{validate_agent_id, MailboxStore};
use agentcomm_registry::{serve_card, AgentCard};

use crate::shutdown_token;

/// Capability configured for `agent_id`.
pub fn capability_for(config: &Config, agent_id: &str) -> Arc<StaticReply> {
    let profile = config.agent_profile(agent_id);
    Arc::new(StaticReply::new(profile.capabilities, profile.reply))
}

/// Build the dispatch loop for `agent_id` from configuration.
pub async fn build_dispatcher(config: &Config, agent_id: &str) -> Result<DispatchLoop> {
    validate_agent_id(agent_id)?;
    let store = MailboxStore::open(&config.mailbox.dir)
        .await
        .context("Mailbox directory is not usable")?;
    Ok(
        DispatchLoop::new(agent_id, store, capability_for(config, agent_id))
            .with_poll_interval(config.dispatch.poll_interval()),
    )
}

pub async fn run_agent(config: &Config, agent_id: &str, with_card: bool) -> Result<()> {
    let dispatcher = build_dispatcher(config, agent_id).await?;
    let cancel = shutdown_token();

    let mut card_server = None;
    if with_card {
        if let Some(addr) = config.agent_profile(agent_id).card_addr()? {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind card server on {}", addr))?;
            let card = AgentCard::new(agent_id, capability_for(config, agent_id).methods());
            card_server = Some(tokio::spawn(serve_card(listener, card, cancel.clone())));
        }
    }

    info!(agent = %agent_id, "Agent started");
    let result = dispatcher.run(cancel.clone()).await;
    cancel.cancel();

    if let Some(handle) = card_server {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(agent = %agent_id, error = %e, "Card server failed"),
            Err(e) => warn!(agent = %agent_id, error = %e, "Card server task panicked"),
        }
    }

    result.with_context(|| format!("Agent {} could not start", agent_id))
}
