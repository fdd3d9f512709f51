//! Envelope types and wire codec for agentcomm.
//!
//! Agents never call each other directly. They exchange JSON-RPC 2.0 shaped
//! envelopes through one-slot mailbox files, and this crate owns the shape
//! of those envelopes:
//!
//! - [`Envelope`]: a routed message whose [`Body`] is a request, a response
//!   or an error. Field presence is enforced by the variant, so a request
//!   without a method cannot be constructed.
//! - [`codec`]: `encode`/`decode` between envelopes and mailbox bytes,
//!   including the `{}` sentinel that marks an empty mailbox.
//! - [`RefactorParams`]: typed view over the params of the built-in
//!   `RequestRefactor` method.
//!
//! # Example
//!
//! ```
//! use agentcomm_protocol::{codec, CorrelationId, Envelope, Params, Slot};
//!
//! let request = Envelope::request("gemini", "claude", CorrelationId::from(1), "Ping", Params::new());
//! let bytes = codec::encode(&request).unwrap();
//! assert_eq!(codec::decode(&bytes).unwrap(), Slot::Occupied(request));
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod params;

pub use codec::{decode, decode_addressed, encode, encode_empty, is_empty, EMPTY_SENTINEL};
pub use envelope::{
    Body, CorrelationId, Envelope, EnvelopeKind, ErrorCode, Params, RpcError, Slot,
    PROTOCOL_VERSION,
};
pub use error::{DecodeError, EncodeError, ParamsError};
pub use params::{RefactorParams, REFACTOR_METHOD};
