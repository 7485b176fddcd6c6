//! Shared counter store for rate limiting.
//!
//! # Data Flow
//! ```text
//! RateLimiter (any pipeline, any process)
//!     → CounterStore::increment (atomic load / rollover / increment)
//!         → memory.rs (DashMap, single process)
//!         → redis.rs  (Lua script, shared across instances)
//!     ← WindowCount { window_start_ms, count }
//! ```
//!
//! # Design Decisions
//! - The store decides rollover, not the caller: one round-trip, no read-then-write
//! - Constructed once at startup and shared by `Arc`; closed at shutdown
//! - Times are epoch milliseconds supplied by the caller's clock

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use serde::Serialize;

pub use memory::MemoryCounterStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisCounterStore;

/// Counter state for one key inside its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowCount {
    pub window_start_ms: u64,
    pub count: u64,
}

impl WindowCount {
    /// A window has elapsed once `window_ms` passed since it started. A clock
    /// that jumped behind the window start also ends it.
    pub fn is_expired(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms < self.window_start_ms || now_ms - self.window_start_ms >= window_ms
    }

    pub fn window_end_ms(&self, window_ms: u64) -> u64 {
        self.window_start_ms.saturating_add(window_ms)
    }
}

/// Counter store failure. The rate limiter maps these to its failure policy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("counter store did not answer within {0} ms")]
    Timeout(u64),
    #[error("counter store returned malformed data: {0}")]
    Protocol(String),
}

/// Atomic per-key window counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Charge one request to `key`.
    ///
    /// Loads the key's window, starts a fresh one (`count = 0`,
    /// `window_start = now_ms`) if none exists or it has expired, then
    /// increments. The whole sequence is atomic with respect to other
    /// increments of the same key. Returns the post-increment state.
    async fn increment(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<WindowCount, StoreError>;

    /// Current window for `key` without charging it. `None` if absent or expired.
    async fn get(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<Option<WindowCount>, StoreError>;

    /// Drop windows that expired by `now_ms`. Returns how many were removed.
    /// Stores with native expiry return 0.
    async fn sweep(&self, _now_ms: u64) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// Release resources at shutdown.
    async fn close(&self) {}

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}
