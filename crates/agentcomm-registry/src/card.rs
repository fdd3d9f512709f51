//! Agent card fetching and serving.

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::{AgentCard, ProbeError};

/// Path of the capability card relative to an agent's base endpoint.
pub const WELL_KNOWN_CARD_PATH: &str = "/.well-known/agent.json";

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of agent cards.
#[async_trait]
pub trait CardFetcher: Send + Sync {
    async fn fetch_card(&self, endpoint: &str) -> Result<AgentCard, ProbeError>;
}

/// Fetches cards over HTTP GET with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpCardFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCardFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Http(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn card_url(endpoint: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), WELL_KNOWN_CARD_PATH)
    }

    fn map_error(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl CardFetcher for HttpCardFetcher {
    async fn fetch_card(&self, endpoint: &str) -> Result<AgentCard, ProbeError> {
        let url = Self::card_url(endpoint);
        debug!(url = %url, "Fetching agent card");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        serde_json::from_slice(&body).map_err(|e| ProbeError::MalformedCard(e.to_string()))
    }
}

async fn get_card(State(card): State<Arc<AgentCard>>) -> Json<AgentCard> {
    Json(card.as_ref().clone())
}

/// Router answering `GET /.well-known/agent.json` with `card`.
pub fn card_router(card: AgentCard) -> Router {
    Router::new()
        .route(WELL_KNOWN_CARD_PATH, get(get_card))
        .with_state(Arc::new(card))
}

/// Serve `card` on `listener` until `cancel` fires.
pub async fn serve_card(
    listener: TcpListener,
    card: AgentCard,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    info!(
        addr = ?listener.local_addr().ok(),
        capabilities = ?card.capabilities,
        "Serving agent card"
    );
    axum::serve(listener, card_router(card))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
