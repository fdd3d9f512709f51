//! Handling of replies that arrive in an agent's own mailbox.

use agentcomm_mailbox::{MailboxError, MailboxStore};
use agentcomm_protocol::{Body, CorrelationId, Envelope};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Receives response and error envelopes claimed by a dispatch loop.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, agent_id: &str, envelope: Envelope);
}

/// Default sink: logs the reply and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ResponseSink for LogSink {
    fn deliver(&self, agent_id: &str, envelope: Envelope) {
        match &envelope.body {
            Body::Response { result } => info!(
                agent = %agent_id,
                from = %envelope.from,
                correlation_id = %envelope.correlation_id,
                result = %result,
                "Received response"
            ),
            Body::Error(error) => warn!(
                agent = %agent_id,
                from = %envelope.from,
                correlation_id = %envelope.correlation_id,
                code = error.code,
                message = %error.message,
                "Received error response"
            ),
            Body::Request { .. } => {}
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("no reply with correlation id {0} within {1:?}")]
    TimedOut(CorrelationId, Duration),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

/// One-shot reader: poll `agent_id`'s mailbox until a response or error
/// carrying `correlation_id` shows up.
///
/// Anything else claimed while waiting is logged and discarded, so this
/// must not run alongside the agent's own dispatch loop.
pub async fn await_response(
    store: &MailboxStore,
    agent_id: &str,
    correlation_id: &CorrelationId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Envelope, WaitError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(envelope) = store.try_claim(agent_id).await? {
            let is_reply = matches!(envelope.body, Body::Response { .. } | Body::Error(_));
            if is_reply && &envelope.correlation_id == correlation_id {
                return Ok(envelope);
            }
            warn!(
                agent = %agent_id,
                expected = %correlation_id,
                got = %envelope.correlation_id,
                kind = %envelope.kind(),
                "Discarding unrelated envelope while waiting for reply"
            );
        }

        if Instant::now() >= deadline {
            return Err(WaitError::TimedOut(correlation_id.clone(), timeout));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcomm_protocol::{Params, RpcError};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_await_response_finds_matching_reply() {
        let dir = TempDir::new().unwrap();
        let store = MailboxStore::open(dir.path()).await.unwrap();
        let request = Envelope::request("gemini", "claude", 11, "Ping", Params::new());
        store.deposit("gemini", &request.reply("pong")).await.unwrap();

        let reply = await_response(
            &store,
            "gemini",
            &CorrelationId::from(11),
            Duration::from_millis(5),
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        assert_eq!(reply.result(), Some("pong"));
    }

    #[tokio::test]
    async fn test_await_response_skips_unrelated_and_times_out() {
        let dir = TempDir::new().unwrap();
        let store = MailboxStore::open(dir.path()).await.unwrap();
        let other = Envelope::request("gemini", "claude", 1, "Ping", Params::new())
            .reply_error(RpcError::internal("nope"));
        store.deposit("gemini", &other).await.unwrap();

        let err = await_response(
            &store,
            "gemini",
            &CorrelationId::from(2),
            Duration::from_millis(5),
            Duration::from_millis(30),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::TimedOut(ref id, _) if *id == CorrelationId::from(2)));
        assert!(store.try_claim("gemini").await.unwrap().is_none());
    }
}
