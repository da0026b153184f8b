//! Redis backend on top of a deadpool connection pool.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};
use redis::{AsyncCommands, RedisResult};

use super::CacheBackend;
use crate::config::RedisConfig;
use crate::error::{BackendError, BackendResult};

const BASE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Upper bound on the pause between connection attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause after failed attempt `attempt` (1-based): 50ms, 100ms, 200ms, ... capped at 2s.
fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    BASE_RETRY_DELAY.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Redis-backed store.
///
/// Creating the backend performs no network I/O; the first command opens a
/// connection. Connection acquisition is retried a bounded number of times
/// and every command runs under a timeout, so a stalled server costs a
/// caller at most a few seconds before the manager falls back to memory.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    command_timeout: Duration,
    max_connect_retries: u32,
}

impl RedisBackend {
    /// Build the pool from configuration.
    pub fn new(url: &str, config: &RedisConfig) -> BackendResult<Self> {
        let mut redis_config = Config::from_url(url);
        let connect_timeout = config.connect_timeout();
        redis_config.pool = Some(PoolConfig {
            max_size: config.pool_size,
            timeouts: Timeouts {
                wait: Some(connect_timeout),
                create: Some(connect_timeout),
                recycle: Some(connect_timeout),
            },
            ..PoolConfig::default()
        });

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BackendError::Connection(format!("failed to create Redis pool: {e}")))?;

        Ok(Self::from_pool(
            pool,
            config.command_timeout(),
            config.max_connect_retries,
        ))
    }

    pub fn from_pool(pool: Pool, command_timeout: Duration, max_connect_retries: u32) -> Self {
        Self {
            pool,
            command_timeout,
            max_connect_retries: max_connect_retries.max(1),
        }
    }

    /// Get a pooled connection, retrying with exponential backoff.
    async fn connection(&self) -> BackendResult<Connection> {
        let mut attempt = 1;
        loop {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt >= self.max_connect_retries => {
                    return Err(BackendError::Connection(format!(
                        "giving up after {attempt} attempts: {e}"
                    )));
                }
                Err(e) => {
                    let delay = retry_delay(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Redis connection attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn timed<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> BackendResult<T> {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout(self.command_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        let _: String = self.timed(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.connection().await?;
        self.timed(conn.get(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        self.timed(conn.set_ex::<_, _, ()>(key, value, ttl_secs))
            .await
    }

    async fn delete(&self, keys: &[String]) -> BackendResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        self.timed(conn.del::<_, ()>(keys.to_vec())).await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);
        self.timed(cmd.query_async(&mut conn)).await
    }

    async fn flush(&self) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        self.timed(redis::cmd("FLUSHDB").query_async(&mut conn))
            .await
    }
}
