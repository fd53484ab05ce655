//! Redis-backed counter store shared across server processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use super::store::CounterStore;
use crate::error::Result;

/// Increment only keys that still exist, so a key that expired between the
/// add and the increment is never resurrected without a TTL.
const INCR_IF_EXISTS: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
";

/// Counter store backed by a Redis server.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    incr_script: Script,
}

impl RedisCounterStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "Connected to Redis counter store");
        Ok(Self::with_connection(conn))
    }

    /// Wrap an already established connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            incr_script: Script::new(INCR_IF_EXISTS),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        let stored: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        debug!(key = %key, stored = stored.is_some(), "SET NX");
        Ok(stored.is_some())
    }

    async fn incr(&self, key: &str, delta: u64) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = self
            .incr_script
            .key(key)
            .arg(delta)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(key).await?;
        Ok(value)
    }
}
