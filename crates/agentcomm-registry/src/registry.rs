//! The registry table.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::card::CardFetcher;
use crate::types::{AgentCard, AgentInfo, AgentStatus, ProbeError, RegistryEntry};

/// Owned table of known agents, keyed by agent id.
///
/// Entries are created by the first successful probe and never removed. A
/// failed probe only flips the status, so capabilities from the last good
/// probe stay visible.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful probe.
    pub fn upsert(&mut self, info: &AgentInfo, card: AgentCard, now: DateTime<Utc>) {
        let capabilities = card.capabilities.into_iter().collect();
        let newly_registered = !self.entries.contains_key(&info.id);
        let entry = RegistryEntry {
            agent_id: info.id.clone(),
            endpoint: info.endpoint.clone(),
            capabilities,
            status: AgentStatus::Active,
            last_seen: now,
        };
        if newly_registered {
            info!(
                agent = %info.id,
                capabilities = ?entry.capabilities,
                "Discovered and registered agent"
            );
        }
        self.entries.insert(info.id.clone(), entry);
    }

    /// Record a failed probe. Returns false when there was no entry to
    /// flip; no entry is created in that case.
    pub fn mark_inactive(&mut self, agent_id: &str) -> bool {
        match self.entries.get_mut(agent_id) {
            Some(entry) => {
                entry.status = AgentStatus::Inactive;
                true
            }
            None => false,
        }
    }

    /// Fold one probe result into the table.
    pub fn apply(
        &mut self,
        info: &AgentInfo,
        result: Result<AgentCard, ProbeError>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(card) => self.upsert(info, card, now),
            Err(e) => {
                let was_active = self.get(&info.id).is_some_and(RegistryEntry::is_active);
                if self.mark_inactive(&info.id) {
                    if was_active {
                        warn!(agent = %info.id, error = %e, "Agent became inactive");
                    }
                } else {
                    warn!(agent = %info.id, error = %e, "Agent is not reachable");
                }
            }
        }
    }

    /// Probe one agent and record the outcome.
    pub async fn probe(&mut self, info: &AgentInfo, fetcher: &dyn CardFetcher) {
        let result = fetcher.fetch_card(&info.endpoint).await;
        self.apply(info, result, Utc::now());
    }

    pub fn get(&self, agent_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(agent_id)
    }

    /// Read-only copy of all entries, ordered by agent id.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
