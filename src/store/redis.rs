//! Redis-backed counter store shared by every gate instance.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;

use super::{CounterStore, StoreError, WindowCount};

/// Load, roll over and increment in one server-side step.
///
/// KEYS[1] = counter hash, ARGV[1] = now (ms), ARGV[2] = window (ms).
/// Returns { window_start_ms, count }.
const INCREMENT_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local start = tonumber(redis.call('HGET', KEYS[1], 'start'))
if (not start) or now < start or now - start >= window then
  redis.call('HSET', KEYS[1], 'start', ARGV[1], 'count', 1)
  redis.call('PEXPIRE', KEYS[1], window)
  return { now, 1 }
end
local count = redis.call('HINCRBY', KEYS[1], 'count', 1)
return { start, count }
"#;

/// Counter store for horizontally scaled deployments.
pub struct RedisCounterStore {
    client: redis::Client,
    script: redis::Script,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisCounterStore {
    /// Create a store from a connection URL (e.g. `redis://127.0.0.1:6379`).
    /// The connection is opened on first use.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            script: redis::Script::new(INCREMENT_SCRIPT),
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let mut conn = self.connection().await?;

        let (start, count): (i64, i64) = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if start < 0 || count < 1 {
            return Err(StoreError::Protocol(format!(
                "increment returned start={} count={}",
                start, count
            )));
        }

        Ok(WindowCount {
            window_start_ms: start as u64,
            count: count as u64,
        })
    }

    async fn get(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<Option<WindowCount>, StoreError> {
        let mut conn = self.connection().await?;

        let (start, count): (Option<u64>, Option<u64>) = redis::cmd("HMGET")
            .arg(key)
            .arg("start")
            .arg("count")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(match (start, count) {
            (Some(window_start_ms), Some(count)) => Some(WindowCount {
                window_start_ms,
                count,
            })
            .filter(|w| !w.is_expired(now_ms, window_ms)),
            _ => None,
        })
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
