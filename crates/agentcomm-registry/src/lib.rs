//! Agent discovery and liveness registry.
//!
//! The registry probes a fixed, configured list of agent endpoints for their
//! capability card and keeps a best-effort table of who is reachable:
//!
//! - [`Registry`]: the owned table (`upsert`, `mark_inactive`, `snapshot`).
//! - [`CardFetcher`] / [`HttpCardFetcher`]: where cards come from.
//! - [`RegistryService`]: the periodic probe loop that owns the table and
//!   publishes snapshots.
//! - [`serve_card`]: the agent side, answering card requests.

pub mod card;
pub mod registry;
pub mod service;
pub mod types;

pub use card::{
    card_router, serve_card, CardFetcher, HttpCardFetcher, DEFAULT_PROBE_TIMEOUT,
    WELL_KNOWN_CARD_PATH,
};
pub use registry::Registry;
pub use service::{read_snapshot, write_snapshot, RegistryService, DEFAULT_PROBE_INTERVAL};
pub use types::{AgentCard, AgentInfo, AgentStatus, ProbeError, RegistryEntry};
