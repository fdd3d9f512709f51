use agentcomm_protocol::EncodeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during mailbox operations.
///
/// Corrupt mailbox content is not an error: it is reported through
/// [`crate::ClaimOutcome::Corrupt`] and the slot is reset.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// The identity cannot be mapped to a mailbox file name.
    #[error("invalid agent id: {0:?}")]
    InvalidAgentId(String),

    /// Filesystem failure on a mailbox or one of its temp files.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl MailboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MailboxError::Io {
            path: path.into(),
            source,
        }
    }
}
