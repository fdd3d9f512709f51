//! `registry`: the discovery process.

use anyhow::Result;
use std::sync::Arc;

use agentcomm_config::Config;
use agentcomm_registry::{AgentInfo, HttpCardFetcher, RegistryService};

use crate::inspect::print_snapshot;
use crate::shutdown_token;

pub fn build_service(config: &Config) -> Result<RegistryService> {
    let registry = &config.registry;
    let fetcher = Arc::new(HttpCardFetcher::new(registry.probe_timeout())?);
    let agents = registry
        .agents
        .iter()
        .map(|agent| AgentInfo::new(&agent.id, &agent.endpoint))
        .collect();

    Ok(RegistryService::new(agents, fetcher)
        .with_probe_interval(registry.probe_interval())
        .with_probe_timeout(registry.probe_timeout())
        .with_snapshot_path(&registry.snapshot_path))
}

pub async fn run_registry(config: &Config, once: bool) -> Result<()> {
    let mut service = build_service(config)?;
    if once {
        let snapshot = service.probe_round().await;
        print_snapshot(&snapshot);
        return Ok(());
    }

    service.run(shutdown_token()).await;
    Ok(())
}
