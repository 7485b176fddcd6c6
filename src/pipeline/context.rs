//! Typed request context accumulated across stages.

use serde::Serialize;
use serde_json::Value;

/// Rate-limit accounting published by the limiter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Window end, seconds since the Unix epoch.
    pub reset: u64,
}

/// A payload that passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestPayload {
    /// Payload type tag (e.g. `campaign`, `kpi`).
    pub kind: String,
    /// The validated JSON object.
    pub data: Value,
}

/// Context handed to the ingestion handler once every stage proceeded.
///
/// The key set is closed: a handler can rely on the compiler to know what
/// a stage may have published.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    /// Rate-limit key the request was charged against.
    pub client_key: Option<String>,
    pub rate_limit: Option<RateLimitInfo>,
    pub payload: Option<IngestPayload>,
}

/// Additions a single stage publishes. Same keys as [`RequestContext`].
///
/// `ContextFragment::default()` is the empty fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextFragment {
    pub client_key: Option<String>,
    pub rate_limit: Option<RateLimitInfo>,
    pub payload: Option<IngestPayload>,
}

impl ContextFragment {
    pub fn is_empty(&self) -> bool {
        self.client_key.is_none() && self.rate_limit.is_none() && self.payload.is_none()
    }

    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(key.into());
        self
    }

    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    pub fn with_payload(mut self, payload: IngestPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl RequestContext {
    /// Merge a fragment into the context. Keys present in the fragment win.
    pub fn merge(&mut self, fragment: ContextFragment) {
        let ContextFragment {
            client_key,
            rate_limit,
            payload,
        } = fragment;

        if client_key.is_some() {
            self.client_key = client_key;
        }
        if rate_limit.is_some() {
            self.rate_limit = rate_limit;
        }
        if payload.is_some() {
            self.payload = payload;
        }
    }
}
