//! Registry probe behaviour against a scripted fetcher and a real card server.

use agentcomm_registry::{
    read_snapshot, serve_card, AgentCard, AgentInfo, AgentStatus, CardFetcher, HttpCardFetcher,
    ProbeError, Registry, RegistryService,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Scripted fetcher: endpoints map to a card, an error, or a hang.
#[derive(Default)]
struct ScriptedFetcher {
    cards: Mutex<HashMap<String, Option<Vec<String>>>>,
    hang: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn up(&self, endpoint: &str, capabilities: &[&str]) {
        self.cards.lock().unwrap().insert(
            endpoint.to_string(),
            Some(capabilities.iter().map(|c| c.to_string()).collect()),
        );
    }

    fn down(&self, endpoint: &str) {
        self.cards.lock().unwrap().insert(endpoint.to_string(), None);
    }

    fn hang(&self, endpoint: &str) {
        self.hang.lock().unwrap().push(endpoint.to_string());
    }
}

#[async_trait]
impl CardFetcher for ScriptedFetcher {
    async fn fetch_card(&self, endpoint: &str) -> Result<AgentCard, ProbeError> {
        let hangs = self.hang.lock().unwrap().iter().any(|e| e == endpoint);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let scripted = self.cards.lock().unwrap().get(endpoint).cloned().flatten();
        match scripted {
            Some(capabilities) => Ok(AgentCard {
                id: None,
                capabilities,
            }),
            None => Err(ProbeError::Http("connection refused".to_string())),
        }
    }
}

fn agents() -> Vec<AgentInfo> {
    vec![
        AgentInfo::new("claude", "http://claude"),
        AgentInfo::new("gemini", "http://gemini"),
    ]
}

#[tokio::test]
async fn test_unreachable_agent_is_never_registered() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.down("http://claude");
    fetcher.up("http://gemini", &["RequestRefactor"]);

    let mut service = RegistryService::new(agents(), fetcher.clone());
    let snapshot = service.probe_round().await;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].agent_id, "gemini");
    assert!(service.registry().get("claude").is_none());
}

#[tokio::test]
async fn test_agent_going_down_keeps_capabilities() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.up("http://claude", &["RequestRefactor"]);
    fetcher.up("http://gemini", &["RequestRefactor"]);

    let mut service = RegistryService::new(agents(), fetcher.clone());
    service.probe_round().await;

    fetcher.down("http://claude");
    let snapshot = service.probe_round().await;

    let claude = snapshot.iter().find(|e| e.agent_id == "claude").unwrap();
    assert_eq!(claude.status, AgentStatus::Inactive);
    assert!(claude.capabilities.contains("RequestRefactor"));

    let gemini = snapshot.iter().find(|e| e.agent_id == "gemini").unwrap();
    assert_eq!(gemini.status, AgentStatus::Active);
}

#[tokio::test]
async fn test_hanging_agent_does_not_block_others() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.up("http://claude", &["RequestRefactor"]);
    fetcher.hang("http://gemini");

    let mut service = RegistryService::new(agents(), fetcher.clone())
        .with_probe_timeout(Duration::from_millis(50));

    let snapshot = tokio::time::timeout(Duration::from_secs(5), service.probe_round())
        .await
        .expect("probe round must be bounded by the probe timeout");

    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].is_active());
}

#[tokio::test]
async fn test_snapshots_are_published() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("state").join("registry.json");
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.up("http://claude", &["RequestRefactor", "Review"]);
    fetcher.down("http://gemini");

    let mut service = RegistryService::new(agents(), fetcher).with_snapshot_path(&snapshot_path);
    let receiver = service.subscribe();
    service.probe_round().await;

    assert_eq!(receiver.borrow().len(), 1);

    let on_disk = read_snapshot(&snapshot_path).await.unwrap();
    assert_eq!(on_disk, service.registry().snapshot());
    assert_eq!(on_disk[0].capabilities.len(), 2);
}

#[tokio::test]
async fn test_missing_snapshot_reads_empty() {
    let dir = TempDir::new().unwrap();
    assert!(read_snapshot(&dir.path().join("nope.json")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_http_probe_against_card_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let cancel = CancellationToken::new();
    let server = tokio::spawn(serve_card(
        listener,
        AgentCard::new("claude", vec!["RequestRefactor".to_string()]),
        cancel.clone(),
    ));

    let fetcher = HttpCardFetcher::new(Duration::from_secs(2)).unwrap();
    let info = AgentInfo::new("claude", endpoint);
    let mut registry = Registry::new();

    registry.probe(&info, &fetcher).await;
    let entry = registry.get("claude").unwrap();
    assert!(entry.is_active());
    assert!(entry.capabilities.contains("RequestRefactor"));

    cancel.cancel();
    server.await.unwrap().unwrap();

    // Server gone: the entry decays but keeps what it knew.
    registry.probe(&info, &fetcher).await;
    let entry = registry.get("claude").unwrap();
    assert_eq!(entry.status, AgentStatus::Inactive);
    assert!(entry.capabilities.contains("RequestRefactor"));
}

#[tokio::test]
async fn test_http_probe_rejects_non_success_and_bad_cards() {
    use axum::routing::get;
    use axum::Router;

    let app = Router::new()
        .route("/missing/.well-known/agent.json", get(|| async { (axum::http::StatusCode::NOT_FOUND, "") }))
        .route("/garbage/.well-known/agent.json", get(|| async { "not a card" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let fetcher = HttpCardFetcher::new(Duration::from_secs(2)).unwrap();

    let err = fetcher.fetch_card(&format!("{}/missing", base)).await.unwrap_err();
    assert!(matches!(err, ProbeError::Status(404)));

    let err = fetcher.fetch_card(&format!("{}/garbage", base)).await.unwrap_err();
    assert!(matches!(err, ProbeError::MalformedCard(_)));
}
