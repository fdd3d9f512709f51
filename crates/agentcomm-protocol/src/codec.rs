//! Wire codec for mailbox content.
//!
//! The wire form is a single JSON object per mailbox:
//!
//! ```json
//! {"jsonrpc": "2.0", "from": "gemini", "to": "claude", "id": 1,
//!  "method": "RequestRefactor", "params": {"codePath": "src/main.rs"}}
//! ```
//!
//! Responses carry `result` and errors carry `error` in place of
//! `method`/`params`. The empty object `{}` is the "nothing pending" state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{Body, CorrelationId, Envelope, Params, RpcError, Slot, PROTOCOL_VERSION};
use crate::error::{DecodeError, EncodeError};

/// Bytes of the empty mailbox sentinel.
pub const EMPTY_SENTINEL: &[u8] = b"{}";

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// Serialize an envelope to its canonical wire form.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
    if envelope.from.is_empty() {
        return Err(EncodeError::EmptyIdentity("from"));
    }
    if envelope.to.is_empty() {
        return Err(EncodeError::EmptyIdentity("to"));
    }

    let mut wire = WireEnvelope {
        jsonrpc: Some(PROTOCOL_VERSION.to_string()),
        from: Some(envelope.from.clone()),
        to: Some(envelope.to.clone()),
        id: Some(envelope.correlation_id.clone()),
        method: None,
        params: None,
        result: None,
        error: None,
    };

    match &envelope.body {
        Body::Request { method, params } => {
            if method.is_empty() {
                return Err(EncodeError::EmptyMethod);
            }
            wire.method = Some(method.clone());
            wire.params = Some(params.clone());
        }
        Body::Response { result } => wire.result = Some(result.clone()),
        Body::Error(error) => wire.error = Some(error.clone()),
    }

    serde_json::to_vec_pretty(&wire).map_err(|e| EncodeError::Serialization(e.to_string()))
}

/// Bytes to write when clearing a mailbox.
pub fn encode_empty() -> Vec<u8> {
    EMPTY_SENTINEL.to_vec()
}

/// Parse mailbox bytes.
///
/// Never panics: anything that is not a complete envelope document, including
/// truncated writes and empty files, comes back as a [`DecodeError`].
pub fn decode(bytes: &[u8]) -> Result<Slot, DecodeError> {
    decode_slot(bytes, None)
}

/// Parse bytes read from `owner`'s mailbox.
///
/// The mailbox location is the recipient: `to` is set to `owner` whatever
/// the document says, and may be absent.
pub fn decode_addressed(bytes: &[u8], owner: &str) -> Result<Slot, DecodeError> {
    decode_slot(bytes, Some(owner))
}

fn decode_slot(bytes: &[u8], owner: Option<&str>) -> Result<Slot, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let is_empty_object = match &value {
        Value::Object(map) => map.is_empty(),
        _ => return Err(DecodeError::MalformedPayload("expected a JSON object".to_string())),
    };
    if is_empty_object {
        return Ok(Slot::Empty);
    }

    let wire: WireEnvelope = serde_json::from_value(value)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    match wire.jsonrpc.as_deref() {
        Some(PROTOCOL_VERSION) => {}
        Some(other) => return Err(DecodeError::UnsupportedVersion(other.to_string())),
        None => return Err(DecodeError::UnsupportedVersion("<missing>".to_string())),
    }

    let from = required_identity(wire.from, "from")?;
    let to = match owner {
        Some(owner) => owner.to_string(),
        None => required_identity(wire.to, "to")?,
    };
    let correlation_id = wire
        .id
        .ok_or_else(|| DecodeError::MalformedPayload("missing `id`".to_string()))?;

    let body = match (wire.method, wire.result, wire.error) {
        (Some(method), None, None) => {
            if method.is_empty() {
                return Err(DecodeError::MalformedPayload("empty `method`".to_string()));
            }
            Body::Request {
                method,
                params: wire.params.unwrap_or_default(),
            }
        }
        (None, Some(result), None) if wire.params.is_none() => Body::Response { result },
        (None, None, Some(error)) if wire.params.is_none() => Body::Error(error),
        _ => {
            return Err(DecodeError::MalformedPayload(
                "exactly one of `method`, `result` or `error` must be present".to_string(),
            ))
        }
    };

    Ok(Slot::Occupied(Envelope {
        from,
        to,
        correlation_id,
        body,
    }))
}

/// True for the "no pending message" state.
pub fn is_empty(slot: &Slot) -> bool {
    slot.is_empty()
}

fn required_identity(value: Option<String>, field: &str) -> Result<String, DecodeError> {
    match value {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(DecodeError::MalformedPayload(format!(
            "missing or empty `{}`",
            field
        ))),
    }
}
