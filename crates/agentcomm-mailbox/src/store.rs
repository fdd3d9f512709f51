//! Mailbox store: claim and deposit over one file per agent.

use agentcomm_protocol::{codec, CorrelationId, DecodeError, Envelope, Slot, EMPTY_SENTINEL};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::MailboxError;

const MAILBOX_PREFIX: &str = "inbound_";
const MAILBOX_EXTENSION: &str = "json";

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// Nothing was pending (or the mailbox did not exist yet).
    Empty,
    /// The pending envelope, now removed from the mailbox.
    Claimed(Envelope),
    /// The mailbox held unreadable bytes. They have been discarded and the
    /// slot reset to empty.
    Corrupt(DecodeError),
}

/// Delivery status of a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The slot was empty (or absent) before the write.
    Delivered,
    /// An unclaimed envelope was overwritten. `previous` is its correlation
    /// id when it could be read.
    Replaced { previous: Option<CorrelationId> },
}

/// Check that an agent id can be used as part of a mailbox file name.
pub fn validate_agent_id(agent_id: &str) -> Result<(), MailboxError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if agent_id.is_empty() || agent_id == "." || agent_id == ".." || !valid_chars {
        return Err(MailboxError::InvalidAgentId(agent_id.to_string()));
    }
    Ok(())
}

/// Directory of per-agent mailbox files.
#[derive(Debug, Clone)]
pub struct MailboxStore {
    dir: PathBuf,
}

impl MailboxStore {
    /// Create a store over `dir` without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store and make sure its directory exists.
    ///
    /// Failure here means the mailbox location is unusable, which callers
    /// treat as fatal.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, MailboxError> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir)
            .await
            .map_err(|e| MailboxError::io(&store.dir, e))?;
        debug!(dir = %store.dir.display(), "Opened mailbox store");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an agent's mailbox file.
    pub fn mailbox_path(&self, agent_id: &str) -> Result<PathBuf, MailboxError> {
        validate_agent_id(agent_id)?;
        Ok(self
            .dir
            .join(format!("{}{}.{}", MAILBOX_PREFIX, agent_id, MAILBOX_EXTENSION)))
    }

    /// Make sure the agent's mailbox exists, creating it empty if absent.
    /// Existing content is left alone.
    pub async fn ensure(&self, agent_id: &str) -> Result<(), MailboxError> {
        let path = self.mailbox_path(agent_id)?;
        self.restore_empty(agent_id, &path).await
    }

    /// Read the mailbox without claiming it. A missing mailbox reads as empty.
    pub async fn peek(&self, agent_id: &str) -> Result<Result<Slot, DecodeError>, MailboxError> {
        let path = self.mailbox_path(agent_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(codec::decode_addressed(&bytes, agent_id)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Ok(Slot::Empty)),
            Err(e) => Err(MailboxError::io(&path, e)),
        }
    }

    /// Take the pending envelope and leave the slot empty. The claimed
    /// envelope's `to` is always `agent_id`.
    ///
    /// The slot file is first renamed to a private claim file. Only one
    /// caller can win that rename, so a deposited envelope is handed out at
    /// most once even with several concurrent claimants.
    pub async fn claim(&self, agent_id: &str) -> Result<ClaimOutcome, MailboxError> {
        let path = self.mailbox_path(agent_id)?;

        let peeked = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(agent = %agent_id, "Mailbox missing, creating it empty");
                self.restore_empty(agent_id, &path).await?;
                return Ok(ClaimOutcome::Empty);
            }
            Err(e) => return Err(MailboxError::io(&path, e)),
        };
        if matches!(codec::decode_addressed(&peeked, agent_id), Ok(Slot::Empty)) {
            return Ok(ClaimOutcome::Empty);
        }

        let claim_path = self.scratch_path(agent_id, "claim");
        match fs::rename(&path, &claim_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(agent = %agent_id, "Lost claim race, mailbox already taken");
                self.restore_empty(agent_id, &path).await?;
                return Ok(ClaimOutcome::Empty);
            }
            Err(e) => return Err(MailboxError::io(&path, e)),
        }

        let read = fs::read(&claim_path).await;
        remove_scratch(&claim_path).await;
        self.restore_empty(agent_id, &path).await?;
        let bytes = read.map_err(|e| MailboxError::io(&claim_path, e))?;

        match codec::decode_addressed(&bytes, agent_id) {
            Ok(Slot::Occupied(envelope)) => {
                info!(
                    agent = %agent_id,
                    correlation_id = %envelope.correlation_id,
                    kind = %envelope.kind(),
                    from = %envelope.from,
                    "Claimed envelope"
                );
                Ok(ClaimOutcome::Claimed(envelope))
            }
            Ok(Slot::Empty) => Ok(ClaimOutcome::Empty),
            Err(e) => {
                warn!(
                    agent = %agent_id,
                    path = %path.display(),
                    error = %e,
                    "Discarded corrupt mailbox content"
                );
                Ok(ClaimOutcome::Corrupt(e))
            }
        }
    }

    /// [`claim`](Self::claim), with corrupt content folded into `None`.
    pub async fn try_claim(&self, agent_id: &str) -> Result<Option<Envelope>, MailboxError> {
        match self.claim(agent_id).await? {
            ClaimOutcome::Claimed(envelope) => Ok(Some(envelope)),
            ClaimOutcome::Empty | ClaimOutcome::Corrupt(_) => Ok(None),
        }
    }

    /// Write `envelope` into `agent_id`'s mailbox, replacing whatever is
    /// there. The recipient is the mailbox location, not `envelope.to`.
    pub async fn deposit(
        &self,
        agent_id: &str,
        envelope: &Envelope,
    ) -> Result<DeliveryStatus, MailboxError> {
        let path = self.mailbox_path(agent_id)?;
        let bytes = codec::encode(envelope)?;

        let status = match self.peek(agent_id).await? {
            Ok(Slot::Empty) | Err(_) => DeliveryStatus::Delivered,
            Ok(Slot::Occupied(pending)) => DeliveryStatus::Replaced {
                previous: Some(pending.correlation_id),
            },
        };

        let tmp_path = self.scratch_path(agent_id, "tmp");
        if let Err(e) = fs::write(&tmp_path, &bytes).await {
            remove_scratch(&tmp_path).await;
            return Err(MailboxError::io(&tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            remove_scratch(&tmp_path).await;
            return Err(MailboxError::io(&path, e));
        }

        if let DeliveryStatus::Replaced { previous } = &status {
            warn!(
                agent = %agent_id,
                replaced = ?previous,
                correlation_id = %envelope.correlation_id,
                "Overwrote an unclaimed envelope"
            );
        } else {
            debug!(
                agent = %agent_id,
                correlation_id = %envelope.correlation_id,
                kind = %envelope.kind(),
                "Deposited envelope"
            );
        }
        Ok(status)
    }

    /// Unique sibling file used for temp writes and claims. Leading dot keeps
    /// it out of the `inbound_*` namespace.
    fn scratch_path(&self, agent_id: &str, suffix: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.{}", agent_id, uuid::Uuid::new_v4(), suffix))
    }

    /// Put the `{}` sentinel in place unless something already occupies the
    /// slot. A deposit that lands between a claim's rename and this call
    /// must survive, so the sentinel is hard-linked in (no clobber).
    async fn restore_empty(&self, agent_id: &str, path: &Path) -> Result<(), MailboxError> {
        let tmp_path = self.scratch_path(agent_id, "empty");
        fs::write(&tmp_path, EMPTY_SENTINEL)
            .await
            .map_err(|e| MailboxError::io(&tmp_path, e))?;
        let linked = fs::hard_link(&tmp_path, path).await;
        remove_scratch(&tmp_path).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => {
                debug!(error = %e, "Hard link unavailable, falling back to create_new");
                create_new_empty(path).await
            }
        }
    }
}

async fn create_new_empty(path: &Path) -> Result<(), MailboxError> {
    use tokio::io::AsyncWriteExt;

    let opened = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;
    match opened {
        Ok(mut file) => {
            file.write_all(EMPTY_SENTINEL)
                .await
                .map_err(|e| MailboxError::io(path, e))?;
            file.flush().await.map_err(|e| MailboxError::io(path, e))
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(MailboxError::io(path, e)),
    }
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcomm_protocol::Params;
    use tempfile::TempDir;

    fn ping(from: &str, to: &str, id: i64) -> Envelope {
        Envelope::request(from, to, id, "Ping", Params::new())
    }

    #[test]
    fn test_validate_agent_id() {
        assert!(validate_agent_id("claude").is_ok());
        assert!(validate_agent_id("gemini-agent_2.v1").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "with space", "ümlaut"] {
            assert!(
                matches!(validate_agent_id(bad), Err(MailboxError::InvalidAgentId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_mailbox_path_is_deterministic() {
        let store = MailboxStore::new("/tmp/queue");
        assert_eq!(
            store.mailbox_path("claude").unwrap(),
            PathBuf::from("/tmp/queue/inbound_claude.json")
        );
    }

    #[tokio::test]
    async fn test_ensure_does_not_clobber() {
        let dir = TempDir::new().unwrap();
        let store = MailboxStore::open(dir.path()).await.unwrap();

        store.ensure("claude").await.unwrap();
        let path = store.mailbox_path("claude").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), EMPTY_SENTINEL);

        store.deposit("claude", &ping("gemini", "claude", 1)).await.unwrap();
        store.ensure("claude").await.unwrap();
        assert!(store.peek("claude").await.unwrap().unwrap().into_envelope().is_some());
    }

    #[tokio::test]
    async fn test_scratch_files_are_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let store = MailboxStore::open(dir.path()).await.unwrap();

        store.deposit("claude", &ping("gemini", "claude", 1)).await.unwrap();
        store.claim("claude").await.unwrap();
        store.claim("claude").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["inbound_claude.json".to_string()]);
    }
}
