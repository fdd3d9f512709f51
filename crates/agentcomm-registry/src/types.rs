//! Registry types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while probing an agent. These only ever flip an
/// entry's status; they are never raised past the registry loop.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe did not finish within the configured timeout.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The card body was not a valid agent card.
    #[error("malformed agent card: {0}")]
    MalformedCard(String),
}

/// A statically configured agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub endpoint: String,
}

impl AgentInfo {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Capability card served at `/.well-known/agent.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub capabilities: Vec<String>,
}

impl AgentCard {
    pub fn new(id: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            id: Some(id.into()),
            capabilities,
        }
    }
}

/// Reachability of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Active => f.write_str("active"),
            AgentStatus::Inactive => f.write_str("inactive"),
        }
    }
}

/// The registry's cached view of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub agent_id: String,
    pub endpoint: String,
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    /// Time of the last successful probe.
    pub last_seen: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}
