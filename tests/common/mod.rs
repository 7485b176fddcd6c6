//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ingest_gate::config::GateConfig;
use ingest_gate::http::GateServer;
use ingest_gate::lifecycle::Shutdown;
use ingest_gate::store::{CounterStore, MemoryCounterStore};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A running gate on an ephemeral port. Stops when dropped.
#[allow(dead_code)]
pub struct TestGate {
    pub addr: SocketAddr,
    pub store: Arc<dyn CounterStore>,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ingest_url(&self) -> String {
        self.url("/api/ingest")
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gate with `config` on 127.0.0.1 and a fresh in-memory store.
#[allow(dead_code)]
pub async fn start_gate(config: GateConfig) -> TestGate {
    start_gate_with(config, |server| server).await
}

/// Like [`start_gate`], letting the caller customise the server first.
pub async fn start_gate_with<F>(config: GateConfig, customise: F) -> TestGate
where
    F: FnOnce(GateServer) -> GateServer,
{
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = customise(GateServer::new(config, store.clone()));
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    wait_until_ready(addr).await;

    TestGate {
        addr,
        store,
        shutdown,
    }
}

async fn wait_until_ready(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gate did not start on {addr}");
}

/// Client that never pools, so each request is independent.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn kpi_payload() -> Value {
    json!({
        "type": "kpi",
        "campaign_id": "spring-sale",
        "sent": 1000,
        "delivered": 990,
        "opens": 420,
        "clicks": 37,
    })
}
