//! Fixed-window rate limiting against a shared counter store.
//!
//! Each request is charged first and decided after: the store increments
//! the key's counter atomically, and the post-increment count decides
//! admission. A charge is never refunded, even if the request is later
//! rejected by another stage or abandoned by the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::json;

use crate::config::{FailurePolicy, RateLimitConfig};
use crate::observability::metrics;
use crate::pipeline::{
    ContextFragment, GateRequest, RateLimitInfo, Rejection, RequestContext, Stage, StageError,
    StageOutcome,
};
use crate::security::clock::Clock;
use crate::security::headers::ClientKeyResolver;
use crate::store::{CounterStore, StoreError, WindowCount};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const RETRY_AFTER: &str = "retry-after";

/// Per-client fixed-window limiter.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    resolver: ClientKeyResolver,
    key_prefix: String,
    limit: u64,
    window_ms: u64,
    policy: FailurePolicy,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            resolver: ClientKeyResolver::new(
                config.trust_forwarded_for,
                config.trusted_proxies.clone(),
            ),
            key_prefix: config.key_prefix.clone(),
            limit: config.max_requests,
            window_ms: config.window_secs.saturating_mul(1000),
            policy: config.failure_policy,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Key a request is charged against.
    pub fn key_for(&self, req: &dyn GateRequest) -> String {
        self.resolver.key(&self.key_prefix, req)
    }

    /// Charge one request to `key` and decide admission.
    pub async fn check_key(&self, key: &str) -> StageOutcome {
        let now_ms = self.clock.now_millis();

        let window = match self.bounded(self.store.increment(key, now_ms, self.window_ms)).await {
            Ok(window) => window,
            Err(e) => return self.on_store_failure(key, e),
        };

        let info = self.info(window);

        if window.count > self.limit {
            let retry_after = window
                .window_end_ms(self.window_ms)
                .saturating_sub(now_ms)
                .div_ceil(1000)
                .max(1);

            tracing::warn!(client = %key, count = window.count, limit = self.limit, "Rate limit exceeded");
            metrics::record_rate_limited();

            return StageOutcome::Terminal(
                Rejection::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    json!({
                        "error": "Too Many Requests",
                        "limit": info.limit,
                        "remaining": info.remaining,
                        "reset": info.reset,
                    }),
                )
                .with_header(RETRY_AFTER, retry_after)
                .with_header(X_RATELIMIT_LIMIT, info.limit)
                .with_header(X_RATELIMIT_REMAINING, info.remaining)
                .with_header(X_RATELIMIT_RESET, info.reset),
            );
        }

        StageOutcome::Proceed(
            ContextFragment::default()
                .with_client_key(key)
                .with_rate_limit(info),
        )
    }

    /// Current budget for the request's key, without charging it.
    pub async fn status(&self, req: &dyn GateRequest) -> Result<RateLimitInfo, StoreError> {
        let key = self.key_for(req);
        let now_ms = self.clock.now_millis();

        let window = self
            .bounded(self.store.get(&key, now_ms, self.window_ms))
            .await?
            .unwrap_or(WindowCount {
                window_start_ms: now_ms,
                count: 0,
            });

        Ok(self.info(window))
    }

    fn info(&self, window: WindowCount) -> RateLimitInfo {
        RateLimitInfo {
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset: window.window_end_ms(self.window_ms).div_ceil(1000),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout.as_millis() as u64)),
        }
    }

    fn on_store_failure(&self, key: &str, err: StoreError) -> StageOutcome {
        metrics::record_store_failure(self.policy);

        match self.policy {
            FailurePolicy::Open => {
                tracing::warn!(
                    client = %key,
                    backend = self.store.backend(),
                    error = %err,
                    "Counter store failure, admitting request (fail-open)"
                );
                StageOutcome::Proceed(ContextFragment::default().with_client_key(key))
            }
            FailurePolicy::Closed => {
                tracing::error!(
                    client = %key,
                    backend = self.store.backend(),
                    error = %err,
                    "Counter store failure, rejecting request (fail-closed)"
                );
                StageOutcome::Terminal(
                    Rejection::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        json!({
                            "error": "Service Unavailable",
                            "message": "Rate limiter unavailable",
                        }),
                    )
                    .with_header(RETRY_AFTER, 1),
                )
            }
        }
    }
}

#[async_trait]
impl Stage for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    async fn run(
        &self,
        req: &dyn GateRequest,
        _ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError> {
        let key = self.key_for(req);
        Ok(self.check_key(&key).await)
    }
}
