//! Configuration management for agentcomm.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults (two mocked agents, `claude` and `gemini`)
//! 2. a TOML file: `--config <path>`, or `agentcomm.toml` in the working
//!    directory when present
//! 3. `AGENTCOMM_*` environment variables, with `__` between path segments
//!    (`AGENTCOMM_DISPATCH__POLL_INTERVAL_MS=200`)
//!
//! ```toml
//! [mailbox]
//! dir = "message_queue"
//!
//! [dispatch]
//! poll_interval_ms = 500
//!
//! [registry]
//! probe_interval_ms = 5000
//! probe_timeout_ms = 2000
//! agents = [{ id = "claude", endpoint = "http://localhost:5000" }]
//!
//! [agents.claude]
//! capabilities = ["RequestRefactor"]
//! reply = "Mocked Claude response: Code refactored successfully."
//! card_addr = "127.0.0.1:5000"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "agentcomm.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "AGENTCOMM";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Directory holding one `inbound_<agent>.json` per agent.
    pub dir: PathBuf,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("message_queue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// An agent endpoint the registry probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Where the latest snapshot is written for other processes to read.
    pub snapshot_path: PathBuf,
    pub agents: Vec<AgentEndpoint>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 5000,
            probe_timeout_ms: 2000,
            snapshot_path: PathBuf::from("message_queue/registry.json"),
            agents: vec![
                AgentEndpoint {
                    id: "claude".to_string(),
                    endpoint: "http://localhost:5000".to_string(),
                },
                AgentEndpoint {
                    id: "gemini".to_string(),
                    endpoint: "http://localhost:5001".to_string(),
                },
            ],
        }
    }
}

impl RegistryConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// What an agent process does with the requests it claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    /// Methods answered by this agent; also advertised on its card.
    pub capabilities: Vec<String>,
    /// Fixed reply returned for every supported method.
    pub reply: String,
    /// Address to serve the agent card on, if any.
    pub card_addr: Option<String>,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            capabilities: vec!["RequestRefactor".to_string()],
            reply: "Task completed.".to_string(),
            card_addr: None,
        }
    }
}

impl AgentProfile {
    pub fn card_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.card_addr
            .as_deref()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| ConfigError::Invalid(format!("card_addr {:?}: {}", addr, e)))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mailbox: MailboxConfig,
    pub dispatch: DispatchConfig,
    pub registry: RegistryConfig,
    pub agents: BTreeMap<String, AgentProfile>,
}

impl Default for Config {
    fn default() -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(
            "claude".to_string(),
            AgentProfile {
                reply: "Mocked Claude response: Code refactored successfully.".to_string(),
                card_addr: Some("127.0.0.1:5000".to_string()),
                ..AgentProfile::default()
            },
        );
        agents.insert(
            "gemini".to_string(),
            AgentProfile {
                reply: "Mocked Gemini response: Code reviewed and approved.".to_string(),
                card_addr: Some("127.0.0.1:5001".to_string()),
                ..AgentProfile::default()
            },
        );
        Self {
            mailbox: MailboxConfig::default(),
            dispatch: DispatchConfig::default(),
            registry: RegistryConfig::default(),
            agents,
        }
    }
}

impl Config {
    /// Load and validate configuration from defaults, a file and the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder
                .add_source(config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };

        let loaded: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Profile for `agent_id`, falling back to the default profile.
    pub fn agent_profile(&self, agent_id: &str) -> AgentProfile {
        self.agents.get(agent_id).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.registry.probe_interval_ms == 0 || self.registry.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "registry probe interval and timeout must be greater than zero".to_string(),
            ));
        }
        for agent in &self.registry.agents {
            if agent.id.is_empty() {
                return Err(ConfigError::Invalid("registry agent with empty id".to_string()));
            }
            if !(agent.endpoint.starts_with("http://") || agent.endpoint.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "registry agent {:?} has non-HTTP endpoint {:?}",
                    agent.id, agent.endpoint
                )));
            }
        }
        for profile in self.agents.values() {
            profile.card_addr()?;
        }
        Ok(())
    }
}
