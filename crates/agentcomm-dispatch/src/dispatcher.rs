//! Per-agent dispatch loop.
//!
//! Each cycle walks Idle -> Claiming -> Invoking -> Responding -> Idle and
//! handles at most one envelope. The loop never accepts new work while a
//! capability call is in flight, which bounds concurrency per agent and
//! keeps responses in request order.
//!
//! Delivery is at-most-once: the claim removes the envelope from the mailbox
//! before the capability runs, so a crash between claim and response loses
//! that task.

use agentcomm_mailbox::{ClaimOutcome, MailboxError, MailboxStore};
use agentcomm_protocol::{Body, CorrelationId, Envelope, EnvelopeKind, Params, RpcError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capability::{Capability, InvokeError};
use crate::response::{LogSink, ResponseSink};

/// Default wait between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Phase of a poll cycle, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Claiming,
    Invoking,
    Responding,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Claiming => "claiming",
            DispatchState::Invoking => "invoking",
            DispatchState::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Nothing was pending.
    Idle,
    /// The mailbox held unreadable content; it was discarded.
    Corrupt,
    /// A reply was deposited into the requester's mailbox.
    Responded {
        to: String,
        correlation_id: CorrelationId,
        kind: EnvelopeKind,
    },
    /// A response or error addressed to this agent was handed to the sink.
    ReplyReceived { correlation_id: CorrelationId },
    /// The reply could not be delivered and was dropped.
    Dropped {
        correlation_id: CorrelationId,
        reason: String,
    },
}

/// Long-running consumer of one agent's mailbox.
pub struct DispatchLoop {
    agent_id: String,
    store: MailboxStore,
    capability: Arc<dyn Capability>,
    sink: Arc<dyn ResponseSink>,
    poll_interval: Duration,
}

impl DispatchLoop {
    pub fn new(
        agent_id: impl Into<String>,
        store: MailboxStore,
        capability: Arc<dyn Capability>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            store,
            capability,
            sink: Arc::new(LogSink),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResponseSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Poll until `cancel` fires.
    ///
    /// Only a failure to set up the agent's own mailbox is returned as an
    /// error. Everything after that is logged and the loop carries on.
    /// Cancellation is observed between cycles, never mid-invocation.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MailboxError> {
        self.store.ensure(&self.agent_id).await?;
        info!(
            agent = %self.agent_id,
            mailbox = %self.store.mailbox_path(&self.agent_id)?.display(),
            poll_interval = ?self.poll_interval,
            "Dispatch loop started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.poll_once().await {
                Ok(PollOutcome::Idle) => {}
                Ok(outcome) => debug!(agent = %self.agent_id, ?outcome, "Poll cycle finished"),
                Err(e) => warn!(agent = %self.agent_id, error = %e, "Poll cycle failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(agent = %self.agent_id, "Dispatch loop stopped");
        Ok(())
    }

    /// Run a single Idle -> ... -> Idle cycle.
    pub async fn poll_once(&self) -> Result<PollOutcome, MailboxError> {
        self.trace_state(DispatchState::Claiming);
        let envelope = match self.store.claim(&self.agent_id).await? {
            ClaimOutcome::Empty => {
                self.trace_state(DispatchState::Idle);
                return Ok(PollOutcome::Idle);
            }
            ClaimOutcome::Corrupt(e) => {
                debug!(agent = %self.agent_id, error = %e, "Skipped undecodable envelope");
                self.trace_state(DispatchState::Idle);
                return Ok(PollOutcome::Corrupt);
            }
            ClaimOutcome::Claimed(envelope) => envelope,
        };

        // Replies are never answered; bouncing them would ping-pong forever.
        let (method, params) = match &envelope.body {
            Body::Request { method, params } => (method, params),
            Body::Response { .. } | Body::Error(_) => {
                let correlation_id = envelope.correlation_id.clone();
                self.sink.deliver(&self.agent_id, envelope);
                self.trace_state(DispatchState::Idle);
                return Ok(PollOutcome::ReplyReceived { correlation_id });
            }
        };

        let reply = if self.capability.supports(method) {
            self.trace_state(DispatchState::Invoking);
            self.invoke(&envelope, method, params).await
        } else {
            warn!(
                agent = %self.agent_id,
                method = %method,
                from = %envelope.from,
                "Unknown method"
            );
            envelope.reply_error(RpcError::method_not_found(method))
        };

        self.trace_state(DispatchState::Responding);
        let outcome = self.respond(&envelope, reply).await;
        self.trace_state(DispatchState::Idle);
        Ok(outcome)
    }

    /// Call the capability on its own task so a panic inside it becomes an
    /// error reply instead of taking the loop down.
    async fn invoke(&self, request: &Envelope, method: &str, params: &Params) -> Envelope {
        let capability = self.capability.clone();
        let method_owned = method.to_string();
        let params = params.clone();
        let handle =
            tokio::spawn(async move { capability.invoke(&method_owned, &params).await });

        match handle.await {
            Ok(Ok(result)) => {
                info!(
                    agent = %self.agent_id,
                    method = %method,
                    correlation_id = %request.correlation_id,
                    "Capability finished"
                );
                request.reply(result)
            }
            Ok(Err(InvokeError::InvalidParams(e))) => {
                warn!(agent = %self.agent_id, method = %method, error = %e, "Invalid params");
                request.reply_error(RpcError::invalid_params(e.to_string()))
            }
            Ok(Err(InvokeError::Failed(e))) => {
                warn!(agent = %self.agent_id, method = %method, error = %e, "Capability failed");
                request.reply_error(RpcError::internal(format!("{:#}", e)))
            }
            Err(e) => {
                warn!(agent = %self.agent_id, method = %method, error = %e, "Capability panicked");
                request.reply_error(RpcError::internal("capability invocation aborted"))
            }
        }
    }

    async fn respond(&self, request: &Envelope, reply: Envelope) -> PollOutcome {
        let kind = reply.kind();
        match self.store.deposit(&request.from, &reply).await {
            Ok(_) => {
                info!(
                    agent = %self.agent_id,
                    to = %request.from,
                    correlation_id = %reply.correlation_id,
                    kind = %kind,
                    "Sent reply"
                );
                PollOutcome::Responded {
                    to: request.from.clone(),
                    correlation_id: reply.correlation_id,
                    kind,
                }
            }
            Err(e) => {
                warn!(
                    agent = %self.agent_id,
                    to = %request.from,
                    correlation_id = %reply.correlation_id,
                    error = %e,
                    "Dropping undeliverable reply"
                );
                PollOutcome::Dropped {
                    correlation_id: reply.correlation_id,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn trace_state(&self, state: DispatchState) {
        debug!(agent = %self.agent_id, state = %state, "Dispatch state");
    }
}
