//! Pipeline scenarios wired from the real stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use ingest_gate::config::{FailurePolicy, GateConfig, RateLimitConfig};
use ingest_gate::pipeline::{
    GateRequest, InboundRequest, Pipeline, RequestContext, Stage, StageError, StageOutcome,
};
use ingest_gate::schema::SchemaValidator;
use ingest_gate::security::{ManualClock, RateLimiter, SizeGuard};
use ingest_gate::store::{CounterStore, MemoryCounterStore, StoreError, WindowCount};
use serde_json::json;

const T0: u64 = 1_700_000_000_000;

fn client_request(body: &str) -> InboundRequest {
    InboundRequest::new()
        .with_client_addr("192.0.2.10".parse().unwrap())
        .with_header("content-length", body.len().to_string())
        .with_body(body.to_string())
}

fn limiter(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(config, store, Arc::new(ManualClock::new(T0))))
}

/// Panics on its first run only.
struct PanicsOnce {
    fired: AtomicBool,
}

#[async_trait]
impl Stage for PanicsOnce {
    fn name(&self) -> &'static str {
        "panics_once"
    }

    async fn run(
        &self,
        _req: &dyn GateRequest,
        _ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            panic!("validator bug");
        }
        Ok(StageOutcome::proceed())
    }
}

#[tokio::test]
async fn test_panicking_stage_after_charge_yields_500_and_pipeline_survives() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let limiter = limiter(&RateLimitConfig::default(), store.clone());

    let pipeline = Pipeline::new()
        .with_stage(SizeGuard::default())
        .with_shared_stage(limiter)
        .with_stage(PanicsOnce {
            fired: AtomicBool::new(false),
        });

    let rejection = pipeline.run(&client_request("{}")).await.unwrap_err();
    assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rejection.body["error"], "Internal Server Error");
    assert!(!rejection.body.to_string().contains("validator bug"));

    // The charge made before the fault stays.
    let window = store.get("ingest:192.0.2.10", T0, 60_000).await.unwrap().unwrap();
    assert_eq!(window.count, 1);

    let ctx = pipeline.run(&client_request("{}")).await.unwrap();
    assert_eq!(ctx.rate_limit.unwrap().remaining, 98);
}

/// Never finishes.
struct Stalls;

#[async_trait]
impl Stage for Stalls {
    fn name(&self) -> &'static str {
        "stalls"
    }

    async fn run(
        &self,
        _req: &dyn GateRequest,
        _ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_abandoned_request_keeps_its_charge() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let pipeline = Pipeline::new()
        .with_shared_stage(limiter(&RateLimitConfig::default(), store.clone()))
        .with_stage(Stalls);

    let req = client_request("{}");
    let outcome = tokio::time::timeout(Duration::from_millis(50), pipeline.run(&req)).await;
    assert!(outcome.is_err());

    let window = store.get("ingest:192.0.2.10", T0, 60_000).await.unwrap().unwrap();
    assert_eq!(window.count, 1);
}

#[tokio::test]
async fn test_full_chain_publishes_key_budget_and_payload() {
    let config = GateConfig::default();
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());

    let pipeline = Pipeline::new()
        .with_stage(SizeGuard::new(config.limits.max_body_bytes))
        .with_shared_stage(limiter(&config.rate_limit, store))
        .with_stage(SchemaValidator::new(&config.validation, config.limits.max_body_bytes));

    let body = json!({
        "type": "campaign",
        "campaign_id": "c-42",
        "name": "Spring",
        "sent_at": "2024-03-01T09:00:00Z",
    })
    .to_string();

    let ctx = pipeline.run(&client_request(&body)).await.unwrap();
    assert_eq!(ctx.client_key.as_deref(), Some("ingest:192.0.2.10"));

    let info = ctx.rate_limit.unwrap();
    assert_eq!(info.limit, 100);
    assert_eq!(info.remaining, 99);
    assert_eq!(info.reset, (T0 + 60_000) / 1000);

    let payload = ctx.payload.unwrap();
    assert_eq!(payload.kind, "campaign");
    assert_eq!(payload.data["campaign_id"], "c-42");
}

#[tokio::test]
async fn test_size_guard_stops_before_rate_limiter_charges() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let pipeline = Pipeline::new()
        .with_stage(SizeGuard::default())
        .with_shared_stage(limiter(&RateLimitConfig::default(), store.clone()));

    let req = InboundRequest::new()
        .with_client_addr("192.0.2.10".parse().unwrap())
        .with_header("content-length", "6291456");

    let rejection = pipeline.run(&req).await.unwrap_err();
    assert_eq!(rejection.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(rejection.body["receivedSize"], "6.00MB");
    assert!(store.get("ingest:192.0.2.10", T0, 60_000).await.unwrap().is_none());
}

/// A store that is always down.
struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn increment(&self, _key: &str, _now_ms: u64, _window_ms: u64) -> Result<WindowCount, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _key: &str, _now_ms: u64, _window_ms: u64) -> Result<Option<WindowCount>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn test_store_outage_policies() {
    let mut config = RateLimitConfig::default();
    let open = Pipeline::new().with_shared_stage(limiter(&config, Arc::new(DownStore)));

    let ctx = open.run(&client_request("{}")).await.unwrap();
    assert_eq!(ctx.client_key.as_deref(), Some("ingest:192.0.2.10"));
    assert!(ctx.rate_limit.is_none());

    config.failure_policy = FailurePolicy::Closed;
    let closed = Pipeline::new().with_shared_stage(limiter(&config, Arc::new(DownStore)));

    let rejection = closed.run(&client_request("{}")).await.unwrap_err();
    assert_eq!(rejection.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rejection.body["message"], "Rate limiter unavailable");
    assert!(rejection
        .headers
        .iter()
        .any(|(name, value)| *name == "retry-after" && value == "1"));
}
