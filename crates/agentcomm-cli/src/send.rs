//! `send`: the bootstrap path that injects a task into the system.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::time::Duration;

use agentcomm_config::Config;
use agentcomm_dispatch::await_response;
use agentcomm_mailbox::{DeliveryStatus, MailboxStore};
use agentcomm_protocol::{
    codec, CorrelationId, Envelope, Params, RefactorParams, REFACTOR_METHOD,
};

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Sender identity; replies land in this agent's mailbox
    #[arg(long)]
    pub from: String,

    /// Recipient identity
    #[arg(long)]
    pub to: String,

    /// Method to invoke
    #[arg(long, default_value = REFACTOR_METHOD)]
    pub method: String,

    /// File to refactor (RequestRefactor)
    #[arg(long)]
    pub code_path: Option<String>,

    /// What to do with it (RequestRefactor)
    #[arg(long)]
    pub instruction: Option<String>,

    /// Raw params as a JSON object, for methods other than RequestRefactor
    #[arg(long)]
    pub params: Option<String>,

    /// Correlation id (number or string); random when omitted
    #[arg(long)]
    pub id: Option<String>,

    /// Wait up to this many seconds for the reply in the sender's mailbox
    #[arg(long)]
    pub wait: Option<u64>,
}

/// Build the request envelope described by `args`.
pub fn build_request(args: &SendArgs) -> Result<Envelope> {
    let params = if args.method == REFACTOR_METHOD {
        let (Some(code_path), Some(instruction)) = (&args.code_path, &args.instruction) else {
            bail!("{} needs --code-path and --instruction", REFACTOR_METHOD);
        };
        RefactorParams::new(code_path, instruction, &args.from).into_params()
    } else {
        match &args.params {
            Some(raw) => serde_json::from_str::<Params>(raw)
                .context("--params must be a JSON object")?,
            None => Params::new(),
        }
    };

    let correlation_id = match &args.id {
        Some(raw) => match raw.parse::<serde_json::Number>() {
            Ok(n) => CorrelationId::from(n),
            Err(_) => CorrelationId::Text(raw.clone()),
        },
        None => CorrelationId::Text(uuid::Uuid::new_v4().to_string()),
    };

    Ok(Envelope::request(
        &args.from,
        &args.to,
        correlation_id,
        &args.method,
        params,
    ))
}

/// Deposit the request and, with `--wait`, block for the reply.
///
/// Returns the reply when one was awaited.
pub async fn run_send(config: &Config, args: &SendArgs) -> Result<Option<Envelope>> {
    let store = MailboxStore::open(&config.mailbox.dir)
        .await
        .context("Mailbox directory is not usable")?;
    let request = build_request(args)?;

    let status = store
        .deposit(&args.to, &request)
        .await
        .with_context(|| format!("Failed to deposit into {}'s mailbox", args.to))?;
    if let DeliveryStatus::Replaced { previous } = status {
        eprintln!(
            "warning: replaced an unclaimed message in {}'s mailbox (id {})",
            args.to,
            previous.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
        );
    }
    println!("Task sent to {} (id {}).", args.to, request.correlation_id);

    let Some(wait_secs) = args.wait else {
        return Ok(None);
    };
    let reply = await_response(
        &store,
        &args.from,
        &request.correlation_id,
        config.dispatch.poll_interval(),
        Duration::from_secs(wait_secs),
    )
    .await?;

    let bytes = codec::encode(&reply)?;
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(Some(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            from: "gemini".into(),
            to: "claude".into(),
            method: REFACTOR_METHOD.into(),
            code_path: Some("src/utils/math.js".into()),
            instruction: Some("simplify".into()),
            params: None,
            id: Some("1".into()),
            wait: None,
        }
    }

    #[test]
    fn test_build_refactor_request() {
        let request = build_request(&args()).unwrap();
        assert_eq!(request.correlation_id, CorrelationId::from(1));
        assert_eq!(request.method(), Some(REFACTOR_METHOD));
        let agentcomm_protocol::Body::Request { params, .. } = &request.body else {
            panic!("expected request");
        };
        let parsed = RefactorParams::from_params(params).unwrap();
        assert_eq!(parsed.from, "gemini");
    }

    #[test]
    fn test_refactor_needs_code_path() {
        let mut args = args();
        args.code_path = None;
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn test_raw_params_and_text_id() {
        let mut args = args();
        args.method = "Review".into();
        args.params = Some(r#"{"pr": 12}"#.into());
        args.id = Some("review-12".into());

        let request = build_request(&args).unwrap();
        assert_eq!(request.correlation_id, CorrelationId::Text("review-12".into()));

        args.params = Some("[1]".into());
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn test_numeric_ids_keep_their_json_form() {
        let mut args = args();
        args.id = Some("18446744073709551615".into());
        assert_eq!(build_request(&args).unwrap().correlation_id, CorrelationId::from(u64::MAX));

        args.id = Some("1.5".into());
        assert_eq!(build_request(&args).unwrap().correlation_id.to_string(), "1.5");
    }

    #[test]
    fn test_random_id_when_omitted() {
        let mut args = args();
        args.id = None;
        let a = build_request(&args).unwrap();
        let b = build_request(&args).unwrap();
        assert_ne!(a.correlation_id, b.correlation_id);
    }
}
