//! Codec and parameter error definitions.

use thiserror::Error;

/// Errors raised while turning an envelope into mailbox bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// `from` or `to` is empty.
    #[error("envelope field `{0}` must be a non-empty agent identity")]
    EmptyIdentity(&'static str),

    /// A request carries an empty method name.
    #[error("request envelope has an empty method")]
    EmptyMethod,

    /// serde_json refused the document.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while reading mailbox bytes.
///
/// Both variants mean the mailbox content cannot be acted on. Callers reset
/// the slot rather than retrying the same bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not a well-formed envelope document.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The document names a protocol version other than the supported one.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
}

/// Errors raised while extracting typed method params.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("missing required param `{0}`")]
    Missing(&'static str),

    #[error("param `{0}` must be a string")]
    NotAString(&'static str),

    #[error("param `{0}` must not be empty")]
    Empty(&'static str),
}
