//! Envelope data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The only protocol version this crate reads or writes.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Method params: a string-keyed JSON mapping.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Opaque value chosen by the sender and echoed by the responder.
///
/// Any JSON number is accepted, including fractions and values past
/// `i64::MAX`, and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationId::Number(n) => write!(f, "{}", n),
            CorrelationId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for CorrelationId {
    fn from(value: i64) -> Self {
        CorrelationId::Number(value.into())
    }
}

impl From<i32> for CorrelationId {
    fn from(value: i32) -> Self {
        CorrelationId::Number(value.into())
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        CorrelationId::Number(value.into())
    }
}

impl From<serde_json::Number> for CorrelationId {
    fn from(value: serde_json::Number) -> Self {
        CorrelationId::Number(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        CorrelationId::Text(value.to_string())
    }
}

/// Well-known JSON-RPC error codes used by the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    /// Map a wire code back to a known code, if it is one.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            _ => None,
        }
    }
}

/// Error payload carried by an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// Discriminant of an envelope's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Response,
    Error,
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvelopeKind::Request => "request",
            EnvelopeKind::Response => "response",
            EnvelopeKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// Payload of an envelope. Exactly one shape is populated per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Request { method: String, params: Params },
    Response { result: String },
    Error(RpcError),
}

/// A routed message between two agents.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Sender identity; replies are deposited into this agent's mailbox.
    pub from: String,
    /// Recipient identity.
    pub to: String,
    pub correlation_id: CorrelationId,
    pub body: Body,
}

impl Envelope {
    /// Create a request envelope.
    pub fn request(
        from: impl Into<String>,
        to: impl Into<String>,
        correlation_id: impl Into<CorrelationId>,
        method: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            correlation_id: correlation_id.into(),
            body: Body::Request {
                method: method.into(),
                params,
            },
        }
    }

    /// Build the successful reply to this envelope, routed back to its sender.
    pub fn reply(&self, result: impl Into<String>) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            correlation_id: self.correlation_id.clone(),
            body: Body::Response {
                result: result.into(),
            },
        }
    }

    /// Build an error reply to this envelope, routed back to its sender.
    pub fn reply_error(&self, error: RpcError) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            correlation_id: self.correlation_id.clone(),
            body: Body::Error(error),
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self.body {
            Body::Request { .. } => EnvelopeKind::Request,
            Body::Response { .. } => EnvelopeKind::Response,
            Body::Error(_) => EnvelopeKind::Error,
        }
    }

    /// The method name, for requests.
    pub fn method(&self) -> Option<&str> {
        match &self.body {
            Body::Request { method, .. } => Some(method),
            _ => None,
        }
    }

    /// The result string, for responses.
    pub fn result(&self) -> Option<&str> {
        match &self.body {
            Body::Response { result } => Some(result),
            _ => None,
        }
    }

    /// The error payload, for error envelopes.
    pub fn error(&self) -> Option<&RpcError> {
        match &self.body {
            Body::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Decoded content of a mailbox slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// The `{}` sentinel: nothing pending.
    Empty,
    Occupied(Envelope),
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(envelope) => Some(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn refactor_request() -> Envelope {
        let mut params = Params::new();
        params.insert("codePath".to_string(), json!("src/utils/math.js"));
        Envelope::request("gemini", "claude", 7, "RequestRefactor", params)
    }

    #[test]
    fn test_reply_swaps_route_and_echoes_correlation() {
        let request = refactor_request();
        let reply = request.reply("done");

        assert_eq!(reply.from, "claude");
        assert_eq!(reply.to, "gemini");
        assert_eq!(reply.correlation_id, CorrelationId::from(7));
        assert_eq!(reply.kind(), EnvelopeKind::Response);
        assert_eq!(reply.result(), Some("done"));
        assert!(reply.method().is_none());
    }

    #[test]
    fn test_reply_error_carries_code() {
        let request = refactor_request();
        let reply = request.reply_error(RpcError::method_not_found("Nope"));

        assert_eq!(reply.kind(), EnvelopeKind::Error);
        let error = reply.error().unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.error_code(), Some(ErrorCode::MethodNotFound));
        assert!(error.message.contains("Nope"));
    }

    #[test]
    fn test_error_code_mapping() {
        for code in [
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code(-1), None);
    }

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(CorrelationId::from(42).to_string(), "42");
        assert_eq!(CorrelationId::from(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(CorrelationId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_slot_helpers() {
        assert!(Slot::Empty.is_empty());
        assert!(Slot::Empty.into_envelope().is_none());

        let slot = Slot::Occupied(refactor_request());
        assert!(!slot.is_empty());
        assert_eq!(slot.into_envelope().unwrap().method(), Some("RequestRefactor"));
    }
}
