//! The capability seam: what an agent actually does with a request.

use agentcomm_protocol::{Params, ParamsError, RefactorParams, REFACTOR_METHOD};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Failure of a capability invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The params did not validate for the method.
    #[error("invalid params: {0}")]
    InvalidParams(#[from] ParamsError),

    /// Anything else the capability reports.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// A task-executing function exposed by an agent.
///
/// Treated as a black box: a method name and params in, a string out.
/// Invocations may block for as long as they need; the dispatch loop waits.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Whether `method` is served by this capability.
    fn supports(&self, method: &str) -> bool;

    /// Method names advertised on the agent card.
    fn methods(&self) -> Vec<String>;

    async fn invoke(&self, method: &str, params: &Params) -> Result<String, InvokeError>;
}

/// Answers every supported method with a fixed reply.
///
/// `RequestRefactor` params are still validated, so a malformed refactor
/// request is reported as invalid params rather than silently accepted.
#[derive(Debug, Clone)]
pub struct StaticReply {
    methods: Vec<String>,
    reply: String,
}

impl StaticReply {
    pub fn new(methods: Vec<String>, reply: impl Into<String>) -> Self {
        Self {
            methods,
            reply: reply.into(),
        }
    }

    /// A refactor-only agent with the stock reply.
    pub fn refactor(reply: impl Into<String>) -> Self {
        Self::new(vec![REFACTOR_METHOD.to_string()], reply)
    }
}

#[async_trait]
impl Capability for StaticReply {
    fn supports(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    fn methods(&self) -> Vec<String> {
        self.methods.clone()
    }

    async fn invoke(&self, method: &str, params: &Params) -> Result<String, InvokeError> {
        if method == REFACTOR_METHOD {
            let task = RefactorParams::from_params(params)?;
            info!(
                code_path = %task.code_path,
                instruction = %task.instruction,
                requested_by = %task.from,
                "New refactor task received"
            );
        }
        debug!(method = %method, reply = %self.reply, "Returning static reply");
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_reply_validates_refactor_params() {
        let capability = StaticReply::refactor("done");
        assert!(capability.supports("RequestRefactor"));
        assert!(!capability.supports("Ping"));

        let mut params = Params::new();
        params.insert("codePath".into(), json!("src/utils/math.js"));
        params.insert("instruction".into(), json!("simplify"));
        params.insert("from".into(), json!("gemini"));
        assert_eq!(capability.invoke("RequestRefactor", &params).await.unwrap(), "done");

        params.insert("codePath".into(), json!(""));
        let err = capability.invoke("RequestRefactor", &params).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidParams(ParamsError::Empty("codePath"))));
    }

    #[tokio::test]
    async fn test_static_reply_other_methods_skip_validation() {
        let capability = StaticReply::new(vec!["Ping".into()], "pong");
        assert_eq!(capability.methods(), vec!["Ping".to_string()]);
        assert_eq!(capability.invoke("Ping", &Params::new()).await.unwrap(), "pong");
    }
}
