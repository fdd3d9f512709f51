//! Periodic probing of configured agents.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::card::{CardFetcher, DEFAULT_PROBE_TIMEOUT};
use crate::registry::Registry;
use crate::types::{AgentInfo, ProbeError, RegistryEntry};

/// Default wait between probe rounds.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Registry loop: owns the [`Registry`] and publishes snapshots of it.
pub struct RegistryService {
    agents: Vec<AgentInfo>,
    fetcher: Arc<dyn CardFetcher>,
    registry: Registry,
    probe_interval: Duration,
    probe_timeout: Duration,
    snapshot_path: Option<PathBuf>,
    publisher: watch::Sender<Vec<RegistryEntry>>,
}

impl RegistryService {
    pub fn new(agents: Vec<AgentInfo>, fetcher: Arc<dyn CardFetcher>) -> Self {
        let (publisher, _) = watch::channel(Vec::new());
        Self {
            agents,
            fetcher,
            registry: Registry::new(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            snapshot_path: None,
            publisher,
        }
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    /// Upper bound on each probe, applied on top of the fetcher's own timeout.
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Also write every published snapshot to `path` as JSON.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Receive snapshots published after each round.
    pub fn subscribe(&self) -> watch::Receiver<Vec<RegistryEntry>> {
        self.publisher.subscribe()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Probe every configured agent once.
    ///
    /// Probes run concurrently and each is bounded by the probe timeout, so
    /// a slow or dead agent never holds up the others.
    pub async fn probe_round(&mut self) -> Vec<RegistryEntry> {
        let timeout = self.probe_timeout;
        let fetcher = &self.fetcher;
        let probes = self.agents.iter().map(|info| async move {
            match tokio::time::timeout(timeout, fetcher.fetch_card(&info.endpoint)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout(timeout)),
            }
        });
        let results = join_all(probes).await;

        let now = Utc::now();
        for (info, result) in self.agents.iter().zip(results) {
            self.registry.apply(info, result, now);
        }

        let snapshot = self.registry.snapshot();
        self.publish(&snapshot).await;
        snapshot
    }

    /// Probe on a fixed interval until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            agents = self.agents.len(),
            interval = ?self.probe_interval,
            timeout = ?self.probe_timeout,
            "Starting agent discovery service"
        );

        loop {
            let snapshot = self.probe_round().await;
            log_snapshot(&snapshot);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.probe_interval) => {}
            }
        }

        info!("Agent discovery service stopped");
    }

    async fn publish(&self, snapshot: &[RegistryEntry]) {
        self.publisher.send_replace(snapshot.to_vec());

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = write_snapshot(path, snapshot).await {
                warn!(path = %path.display(), error = %e, "Failed to write registry snapshot");
            }
        }
    }
}

fn log_snapshot(snapshot: &[RegistryEntry]) {
    if snapshot.is_empty() {
        info!("No agents registered yet");
        return;
    }
    info!("Current registered agents:");
    for entry in snapshot {
        info!(
            "  - {}: status={}, capabilities={:?}, last_seen={}",
            entry.agent_id,
            entry.status,
            entry.capabilities,
            entry.last_seen.to_rfc3339()
        );
    }
}

/// Write a snapshot atomically (temp file + rename).
pub async fn write_snapshot(path: &Path, snapshot: &[RegistryEntry]) -> Result<()> {
    let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize snapshot")?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry".to_string());
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp_path, &json)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    debug!(path = %path.display(), entries = snapshot.len(), "Wrote registry snapshot");
    Ok(())
}

/// Read a snapshot written by a running registry. A missing file means no
/// registry has published yet.
pub async fn read_snapshot(path: &Path) -> Result<Vec<RegistryEntry>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed registry snapshot {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
