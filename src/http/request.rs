//! Request adapter: axum request → `GateRequest`.
//!
//! # Responsibilities
//! - Expose headers and peer address to pipeline stages
//! - Read the body lazily, only when a stage asks for it
//! - Enforce the body ceiling while streaming, for requests without a
//!   usable `Content-Length`
//!
//! # Design Decisions
//! - Header-only stages (size guard, rate limiter) never trigger a body read
//! - The body is read at most once and cached for later stages

use std::net::IpAddr;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::HeaderMap;
use futures_util::StreamExt;
use tokio::sync::{Mutex, OnceCell};

use crate::pipeline::{BodyError, GateRequest};

/// A request as seen by the pipeline, backed by an axum body.
pub struct AxumRequest {
    headers: HeaderMap,
    peer: Option<IpAddr>,
    body: Mutex<Option<Body>>,
    buffered: OnceCell<Bytes>,
    max_body_bytes: usize,
}

impl AxumRequest {
    pub fn new(headers: HeaderMap, body: Body, peer: Option<IpAddr>, max_body_bytes: u64) -> Self {
        Self {
            headers,
            peer,
            body: Mutex::new(Some(body)),
            buffered: OnceCell::new(),
            max_body_bytes: usize::try_from(max_body_bytes).unwrap_or(usize::MAX),
        }
    }
}

#[async_trait]
impl GateRequest for AxumRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn client_addr(&self) -> Option<IpAddr> {
        self.peer
    }

    async fn body(&self) -> Result<Bytes, BodyError> {
        self.buffered
            .get_or_try_init(|| async {
                let body = self
                    .body
                    .lock()
                    .await
                    .take()
                    .ok_or_else(|| BodyError::Read("body already consumed".to_string()))?;
                read_bounded(body, self.max_body_bytes).await
            })
            .await
            .cloned()
    }
}

/// Collect a body, failing as soon as it grows past `limit` bytes.
pub async fn read_bounded(body: Body, limit: usize) -> Result<Bytes, BodyError> {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BodyError::Read(e.to_string()))?;
        if buf.len().saturating_add(chunk.len()) > limit {
            return Err(BodyError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}
