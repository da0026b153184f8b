//! Remote key-value backends.
//!
//! The manager talks to the shared store only through [`CacheBackend`]. The
//! implementation is chosen once at construction:
//!
//! - [`RedisBackend`]: pooled Redis connections, lazy connect, bounded retry
//!   and per-command timeouts
//! - [`NullBackend`]: no remote store; every call reports `NotConfigured` so
//!   the manager stays on the in-memory path

mod null;
mod redis;

pub use self::null::NullBackend;
pub use self::redis::RedisBackend;

use async_trait::async_trait;

use crate::error::BackendResult;

/// Minimal command surface the cache needs from a shared store.
///
/// Values are UTF-8 JSON text and TTLs are whole seconds.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name reported in stats and logs.
    fn name(&self) -> &'static str;

    /// Whether a remote store exists at all.
    fn is_configured(&self) -> bool {
        true
    }

    /// Connectivity probe, used only for health checks.
    async fn ping(&self) -> BackendResult<()>;

    /// Read a raw value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Write a value that expires after `ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()>;

    /// Delete the given keys.
    async fn delete(&self, keys: &[String]) -> BackendResult<()>;

    /// One incremental scan step. A returned cursor of `0` ends the iteration.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)>;

    /// Drop every key in the backend's database.
    async fn flush(&self) -> BackendResult<()>;
}

/// Escape Redis glob metacharacters other than `*`.
///
/// Redis MATCH treats `?`, `[`, `]` and `\` as special; the cache only supports
/// `*`, so the rest are matched literally just like the in-memory store does.
pub fn redis_match_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_match_pattern() {
        assert_eq!(redis_match_pattern("student:42:*"), "student:42:*");
        assert_eq!(redis_match_pattern("student:a?[b]*"), "student:a\\?\\[b\\]*");
    }
}
