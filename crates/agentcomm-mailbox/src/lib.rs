//! File-backed one-slot mailboxes.
//!
//! Every agent identity owns exactly one mailbox file,
//! `<dir>/inbound_<agent>.json`, holding either one pending envelope or the
//! `{}` sentinel. Senders [`MailboxStore::deposit`] into a recipient's slot
//! and the recipient's dispatch loop [`MailboxStore::claim`]s it.
//!
//! Both operations are built on same-directory `rename`, so a reader sees
//! either the complete old content or the complete new content, and only one
//! claimant can take a given envelope.

mod error;
mod store;

pub use error::MailboxError;
pub use store::{validate_agent_id, ClaimOutcome, DeliveryStatus, MailboxStore};
