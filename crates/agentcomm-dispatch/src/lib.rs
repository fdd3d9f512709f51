//! Dispatch loop for agentcomm agents.
//!
//! An agent process runs one [`DispatchLoop`] over its own mailbox. Each
//! claimed request is handed to the agent's [`Capability`] and the outcome
//! is deposited, as a response or error envelope, into the requester's
//! mailbox. Replies that land in the agent's own mailbox go to a
//! [`ResponseSink`].

pub mod capability;
pub mod dispatcher;
pub mod response;

pub use capability::{Capability, InvokeError, StaticReply};
pub use dispatcher::{DispatchLoop, DispatchState, PollOutcome, DEFAULT_POLL_INTERVAL};
pub use response::{await_response, LogSink, ResponseSink, WaitError};
