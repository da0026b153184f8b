//! Error types for the cache engine.
//!
//! Only usage errors reach callers. Infrastructure failures are expressed as
//! [`BackendError`], which the manager consumes internally and turns into a
//! fallback to the in-memory store.

use std::sync::Arc;

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced to callers of the cache.
///
/// Messages never carry the offending key, pattern or value.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Key rejected by namespace/length/character checks
    #[error("invalid cache key: {0}")]
    InvalidKey(&'static str),

    /// Deletion pattern rejected
    #[error("invalid cache pattern: {0}")]
    InvalidPattern(&'static str),

    /// Identifier passed to an invalidation or key helper is unusable
    #[error("invalid cache identifier: {0}")]
    InvalidIdentifier(&'static str),

    /// TTL of zero seconds
    #[error("cache ttl must be at least one second")]
    InvalidTtl,

    /// Serialized value exceeds the size limit
    #[error("cache value of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Value could not be converted to JSON
    #[error("cache value is not serializable: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// The compute function given to `cached()` failed
    #[error("cached computation failed: {0}")]
    Compute(Arc<anyhow::Error>),
}

impl CacheError {
    /// True for errors caused by malformed input rather than a failed computation.
    pub fn is_validation(&self) -> bool {
        !matches!(self, CacheError::Compute(_))
    }
}

/// Failures talking to the remote backend. Never returned by the manager.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No backend configured (in-memory-only mode)
    #[error("no cache backend configured")]
    NotConfigured,

    /// Could not obtain a connection
    #[error("backend connection error: {0}")]
    Connection(String),

    /// Command did not complete in time
    #[error("backend command timed out after {0}ms")]
    Timeout(u64),

    /// Command returned an error
    #[error("backend command error: {0}")]
    Command(#[from] redis::RedisError),
}

pub type BackendResult<T> = Result<T, BackendError>;
