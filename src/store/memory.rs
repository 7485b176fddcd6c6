//! In-process counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{CounterStore, StoreError, WindowCount};
use crate::security::clock::Clock;

#[derive(Debug, Clone, Copy)]
struct Slot {
    window: WindowCount,
    /// Window length the slot was last charged with; the sweeper uses it.
    window_ms: u64,
}

/// Counter store for a single instance (and for tests).
///
/// DashMap's entry API holds the shard lock across load, rollover and
/// increment, so concurrent requests for one key never interleave.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    slots: Arc<DashMap<String, Slot>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys, expired or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn remove_expired(&self, now_ms: u64) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| !slot.window.is_expired(now_ms, slot.window_ms));
        before.saturating_sub(self.slots.len())
    }

    /// Periodically drop expired windows until shutdown fires.
    pub fn spawn_sweeper(
        &self,
        clock: Arc<dyn Clock>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.remove_expired(clock.now_millis());
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Swept expired rate-limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Counter store sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let fresh = Slot {
            window: WindowCount {
                window_start_ms: now_ms,
                count: 0,
            },
            window_ms,
        };

        let mut slot = self.slots.entry(key.to_string()).or_insert(fresh);
        if slot.window.is_expired(now_ms, window_ms) {
            *slot = fresh;
        }
        slot.window.count += 1;
        slot.window_ms = window_ms;
        Ok(slot.window)
    }

    async fn get(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<Option<WindowCount>, StoreError> {
        Ok(self
            .slots
            .get(key)
            .map(|slot| slot.window)
            .filter(|w| !w.is_expired(now_ms, window_ms)))
    }

    async fn sweep(&self, now_ms: u64) -> Result<usize, StoreError> {
        Ok(self.remove_expired(now_ms))
    }

    async fn close(&self) {
        self.slots.clear();
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
