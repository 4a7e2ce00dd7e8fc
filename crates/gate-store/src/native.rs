//! Native protocol transport.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, RedisResult};
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::traits::{KeyScan, KvStore};

/// Store reached over the native redis protocol.
///
/// Holds a [`ConnectionManager`], which multiplexes commands over one
/// connection and reconnects transparently after failures.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
    scan_count: u32,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .field("scan_count", &self.scan_count)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url` and verify liveness with `PING`.
    ///
    /// Both the connection and the PING must finish within `connect_timeout`.
    /// Subsequent commands are bounded by `op_timeout`.
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        let mut conn = match tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
        {
            Ok(res) => res.map_err(|e| map_redis(e, connect_timeout))?,
            Err(_) => return Err(StoreError::Timeout(connect_timeout)),
        };

        let pong: String =
            match tokio::time::timeout(connect_timeout, redis::cmd("PING").query_async(&mut conn))
                .await
            {
                Ok(res) => res.map_err(|e| map_redis(e, connect_timeout))?,
                Err(_) => return Err(StoreError::Timeout(connect_timeout)),
            };
        debug!(reply = %pong, "native store ping succeeded");

        Ok(Self {
            conn,
            timeout: op_timeout,
            scan_count: gate_core::DEFAULT_SCAN_COUNT,
        })
    }

    /// Page size requested per SCAN round trip.
    pub fn scan_count(mut self, count: u32) -> Self {
        self.scan_count = count.max(1);
        self
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| map_redis(e, self.timeout)),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

fn map_redis(err: RedisError, timeout: Duration) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(timeout)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        StoreError::transport(err)
    } else {
        StoreError::Remote(err.to_string())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        trace!(key, "native get");
        let mut conn = self.conn.clone();
        let value: Option<String> = self.bounded(conn.get(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        trace!(key, "native set");
        let mut conn = self.conn.clone();
        let _: () = self.bounded(conn.set(key, value)).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyScan for RedisStore {
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count);
            let (next, batch): (u64, Vec<String>) =
                self.bounded(cmd.query_async(&mut conn)).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}
