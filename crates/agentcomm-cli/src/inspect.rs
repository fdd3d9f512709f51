//! Read-only views: `inbox` and `agents`.

use anyhow::{Context, Result};

use agentcomm_config::Config;
use agentcomm_mailbox::MailboxStore;
use agentcomm_protocol::{codec, Slot};
use agentcomm_registry::{read_snapshot, RegistryEntry};

pub async fn show_inbox(config: &Config, agent_id: &str) -> Result<()> {
    let store = MailboxStore::new(&config.mailbox.dir);
    match store.peek(agent_id).await? {
        Ok(Slot::Empty) => println!("{}'s mailbox is empty.", agent_id),
        Ok(Slot::Occupied(envelope)) => {
            let bytes = codec::encode(&envelope)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        Err(e) => println!(
            "{}'s mailbox is corrupt ({}); it resets on the next claim.",
            agent_id, e
        ),
    }
    Ok(())
}

pub async fn show_agents(config: &Config) -> Result<()> {
    let path = &config.registry.snapshot_path;
    let snapshot = read_snapshot(path)
        .await
        .with_context(|| format!("Failed to read registry snapshot {}", path.display()))?;
    print_snapshot(&snapshot);
    Ok(())
}

pub fn print_snapshot(snapshot: &[RegistryEntry]) {
    print!("{}", format_snapshot(snapshot));
}

/// Render a snapshot as a fixed-width table.
pub fn format_snapshot(snapshot: &[RegistryEntry]) -> String {
    if snapshot.is_empty() {
        return "No agents registered.\n".to_string();
    }

    let id_width = snapshot
        .iter()
        .map(|e| e.agent_id.len())
        .max()
        .unwrap_or(0)
        .max("AGENT".len());

    let mut out = format!(
        "{:<id_width$}  {:<8}  {:<25}  CAPABILITIES\n",
        "AGENT", "STATUS", "LAST SEEN"
    );
    for entry in snapshot {
        let capabilities: Vec<&str> = entry.capabilities.iter().map(String::as_str).collect();
        out.push_str(&format!(
            "{:<id_width$}  {:<8}  {:<25}  {}\n",
            entry.agent_id,
            entry.status.to_string(),
            entry.last_seen.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            capabilities.join(", ")
        ));
    }
    out
}
