//! End-to-end tests of the ingestion endpoint over real sockets.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::response::Response;
use ingest_gate::config::GateConfig;
use ingest_gate::http::IngestHandler;
use ingest_gate::pipeline::RequestContext;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

/// Write a raw HTTP/1.1 request and return (status, body).
async fn raw_request(addr: SocketAddr, head: &str, body: &[u8]) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();

    // The gate may close without reading what is left of a rejected body;
    // keep whatever arrived before the connection went away.
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    let text = String::from_utf8_lossy(&raw);

    let status: u16 = text
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| serde_json::from_str(b).unwrap_or(Value::Null))
        .unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_declared_oversize_rejected_before_body() {
    let gate = common::start_gate(GateConfig::default()).await;

    let head = "POST /api/ingest HTTP/1.1\r\nHost: gate\r\nContent-Type: application/json\r\nContent-Length: 6291456\r\nConnection: close\r\n\r\n";
    let (status, body) = raw_request(gate.addr, head, b"").await;

    assert_eq!(status, 413);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Payload Too Large",
            "message": "Request payload exceeds 5MB limit (received 6.00MB)",
            "maxSize": "5MB",
            "receivedSize": "6.00MB",
        })
    );
}

#[tokio::test]
async fn test_declared_oversize_is_not_charged() {
    let gate = common::start_gate(GateConfig::default()).await;

    let head = "POST /api/ingest HTTP/1.1\r\nHost: gate\r\nContent-Length: 6291456\r\nConnection: close\r\n\r\n";
    raw_request(gate.addr, head, b"").await;

    let quota: Value = common::client()
        .get(gate.url("/api/ingest/quota"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quota["remaining"], 100);
}

#[tokio::test]
async fn test_chunked_oversize_rejected_while_streaming() {
    let mut config = GateConfig::default();
    config.limits.max_body_bytes = 1536;
    let gate = common::start_gate(config).await;

    let chunk = vec![b'x'; 2048];
    let mut body = format!("{:x}\r\n", chunk.len()).into_bytes();
    body.extend_from_slice(&chunk);
    body.extend_from_slice(b"\r\n0\r\n\r\n");

    let head = "POST /api/ingest HTTP/1.1\r\nHost: gate\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
    let (status, body) = raw_request(gate.addr, head, &body).await;

    assert_eq!(status, 413);
    assert_eq!(body["error"], "Payload Too Large");
    assert!(body.get("maxSize").is_some());
    assert!(body.get("receivedSize").is_none());
}

#[tokio::test]
async fn test_valid_payload_accepted_with_rate_limit_headers() {
    let gate = common::start_gate(GateConfig::default()).await;

    let res = common::client()
        .post(gate.ingest_url())
        .json(&common::kpi_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 202);
    assert_eq!(res.headers()["x-ratelimit-limit"], "100");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "99");
    assert!(res.headers().contains_key("x-ratelimit-reset"));
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["type"], "kpi");
}

#[tokio::test]
async fn test_schema_errors_are_listed() {
    let gate = common::start_gate(GateConfig::default()).await;

    let res = common::client()
        .post(gate.ingest_url())
        .json(&json!({"type": "kpi", "campaign_id": "c", "sent": -1}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    let errors: Vec<String> = serde_json::from_value(body["errors"].clone()).unwrap();
    assert!(errors.contains(&"missing required field `delivered`".to_string()));
    assert!(errors.contains(&"field `sent` must be a non-negative number".to_string()));
}

#[tokio::test]
async fn test_schema_rejection_still_charges_budget() {
    let gate = common::start_gate(GateConfig::default()).await;
    let client = common::client();

    let res = client
        .post(gate.ingest_url())
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let quota: Value = client
        .get(gate.url("/api/ingest/quota"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quota["limit"], 100);
    assert_eq!(quota["remaining"], 99);
}

#[tokio::test]
async fn test_hundred_and_first_request_is_limited() {
    let gate = common::start_gate(GateConfig::default()).await;
    let client = common::client();

    for i in 0..100 {
        let res = client
            .post(gate.ingest_url())
            .json(&common::kpi_payload())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 202, "request {} should be admitted", i + 1);
    }

    let res = client
        .post(gate.ingest_url())
        .json(&common::kpi_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 429);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["limit"], 100);
    assert_eq!(body["remaining"], 0);
    assert!(body["reset"].as_u64().is_some());
}

#[tokio::test]
async fn test_concurrent_burst_admits_exactly_the_limit() {
    let gate = common::start_gate(GateConfig::default()).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for _ in 0..150 {
        let client = client.clone();
        let url = gate.ingest_url();
        tasks.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&common::kpi_payload())
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }

    let mut accepted = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            202 => accepted += 1,
            429 => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(accepted, 100);
    assert_eq!(limited, 50);
}

#[tokio::test]
async fn test_forwarded_for_from_trusted_proxy_splits_budgets() {
    let mut config = GateConfig::default();
    config.rate_limit.max_requests = 1;
    config.rate_limit.trust_forwarded_for = true;
    config.rate_limit.trusted_proxies = vec!["127.0.0.1".parse().unwrap()];
    let gate = common::start_gate(config).await;
    let client = common::client();

    let send = |xff: &'static str| {
        client
            .post(gate.ingest_url())
            .header("x-forwarded-for", xff)
            .json(&common::kpi_payload())
            .send()
    };

    assert_eq!(send("203.0.113.7").await.unwrap().status(), 202);
    assert_eq!(send("203.0.113.7, 10.0.0.1").await.unwrap().status(), 429);
    assert_eq!(send("198.51.100.2").await.unwrap().status(), 202);
}

#[tokio::test]
async fn test_disabled_rate_limit_has_no_quota() {
    let mut config = GateConfig::default();
    config.rate_limit.enabled = false;
    let gate = common::start_gate(config).await;
    let client = common::client();

    let res = client
        .post(gate.ingest_url())
        .json(&common::kpi_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    assert!(!res.headers().contains_key("x-ratelimit-limit"));

    let res = client.get(gate.url("/api/ingest/quota")).send().await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let gate = common::start_gate(GateConfig::default()).await;

    let res = common::client()
        .get(gate.url("/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "trace-me-123");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

struct PanickingHandler;

#[async_trait]
impl IngestHandler for PanickingHandler {
    async fn handle(&self, _ctx: RequestContext) -> Response {
        panic!("database password is hunter2");
    }
}

#[tokio::test]
async fn test_handler_panic_becomes_generic_500() {
    let gate = common::start_gate_with(GateConfig::default(), |server| {
        server.with_handler(PanickingHandler)
    })
    .await;
    let client = common::client();

    let res = client
        .post(gate.ingest_url())
        .json(&common::kpi_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Internal Server Error",
            "message": "An unexpected error occurred while processing the request",
        })
    );

    let res = client.get(gate.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}
