//! Startup wiring.
//!
//! The counter store is built exactly once per process, before any
//! listener, and shared into every pipeline the server builds.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigError, RateLimitConfig, StoreBackend};
use crate::lifecycle::Shutdown;
use crate::security::clock::Clock;
use crate::store::{CounterStore, MemoryCounterStore, StoreError};

/// Fatal startup failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build counter store: {0}")]
    Store(#[from] StoreError),
    #[error("redis backend requested but the `redis` feature is not enabled")]
    RedisDisabled,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the configured counter store. The in-memory store also gets a
/// sweeper task that stops with `shutdown`.
pub fn build_store(
    config: &RateLimitConfig,
    clock: Arc<dyn Clock>,
    shutdown: &Shutdown,
) -> Result<Arc<dyn CounterStore>, StartupError> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = MemoryCounterStore::new();
            store.spawn_sweeper(
                clock,
                Duration::from_secs(config.sweep_interval_secs.max(1)),
                shutdown.subscribe(),
            );
            tracing::info!(backend = "memory", "Counter store ready");
            Ok(Arc::new(store))
        }
        StoreBackend::Redis => redis_store(config),
    }
}

#[cfg(feature = "redis")]
fn redis_store(config: &RateLimitConfig) -> Result<Arc<dyn CounterStore>, StartupError> {
    let url = config.store.url.as_deref().unwrap_or_default();
    let store = crate::store::RedisCounterStore::new(url)?;
    tracing::info!(backend = "redis", "Counter store ready");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
fn redis_store(_config: &RateLimitConfig) -> Result<Arc<dyn CounterStore>, StartupError> {
    Err(StartupError::RedisDisabled)
}
