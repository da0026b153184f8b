//! Cache manager: backend selection, fallback and request coalescing.
//!
//! ## Lookup
//!
//! ```text
//! get(key) → validate → backend healthy? ──yes──→ Redis GET ──error──┐
//!                              │                                      │
//!                              no                                     │
//!                              ↓                                      ↓
//!                         in-memory store  ←───── mark unavailable ───┘
//! ```
//!
//! ## Graceful Degradation
//!
//! Backend failures never reach the caller. A failed command flips the cached
//! health flag, and every operation falls through to the in-memory store
//! until the next probe (at most once per health interval) succeeds.
//! Validation failures (bad key or pattern, oversized or unserializable
//! value) are always returned as errors.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{CacheBackend, NullBackend, redis_match_pattern};
use crate::config::{Environment, HEALTH_CHECK_INTERVAL, MAX_VALUE_SIZE, SCAN_BATCH_SIZE};
use crate::error::{BackendError, CacheError, CacheResult};
use crate::health::{Availability, HealthState};
use crate::invalidation::CacheInvalidation;
use crate::memory::{DEFAULT_SWEEP_THRESHOLD, MemoryStore, glob_to_regex};
use crate::metrics;
use crate::validation::{validate_key, validate_pattern};

/// TTL used when neither the call nor the builder specifies one.
pub const DEFAULT_TTL_SECS: u64 = 300;

type SharedComputation = Shared<BoxFuture<'static, CacheResult<Value>>>;

/// Per-call write options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expiry in whole seconds; the manager default applies when `None`.
    pub ttl_secs: Option<u64>,
}

impl SetOptions {
    pub fn ttl(secs: u64) -> Self {
        Self {
            ttl_secs: Some(secs),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Backend name ("redis" or "memory")
    pub mode: &'static str,
    /// Last probe result, `None` before the first probe
    pub backend_available: Option<bool>,
    pub memory_entries: usize,
    pub pending_requests: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Inner {
    backend: Arc<dyn CacheBackend>,
    memory: MemoryStore,
    pending: DashMap<String, (u64, SharedComputation)>,
    next_computation: AtomicU64,
    health: HealthState,
    default_ttl_secs: u64,
    environment: Environment,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Namespaced cache over a remote backend with in-memory fallback.
///
/// Cloning is cheap; clones share the same stores, health state and
/// in-flight computations.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.inner.backend.name())
            .field("memory_entries", &self.inner.memory.len())
            .finish()
    }
}

/// Builder for [`CacheManager`].
pub struct CacheManagerBuilder {
    backend: Arc<dyn CacheBackend>,
    default_ttl_secs: u64,
    health_interval: Duration,
    sweep_threshold: usize,
    environment: Environment,
}

impl CacheManagerBuilder {
    pub fn default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn build(self) -> CacheManager {
        CacheManager {
            inner: Arc::new(Inner {
                backend: self.backend,
                memory: MemoryStore::new(self.sweep_threshold),
                pending: DashMap::new(),
                next_computation: AtomicU64::new(0),
                health: HealthState::new(self.health_interval),
                default_ttl_secs: self.default_ttl_secs.max(1),
                environment: self.environment,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }
}

/// Namespace part of a key, safe to log.
fn namespace(key: &str) -> &str {
    key.split(':').next().unwrap_or_default()
}

fn serialization_error(e: serde_json::Error) -> CacheError {
    CacheError::Serialization(Arc::new(e))
}

impl CacheManager {
    pub fn builder(backend: Arc<dyn CacheBackend>) -> CacheManagerBuilder {
        CacheManagerBuilder {
            backend,
            default_ttl_secs: DEFAULT_TTL_SECS,
            health_interval: HEALTH_CHECK_INTERVAL,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            environment: Environment::default(),
        }
    }

    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::builder(backend).build()
    }

    /// Manager without a remote backend.
    pub fn memory_only() -> Self {
        Self::new(Arc::new(NullBackend))
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    /// Invalidation helpers bound to this manager.
    pub fn invalidation(&self) -> CacheInvalidation {
        CacheInvalidation::new(self.clone())
    }

    /// Whether the backend is usable, using the cached probe when fresh.
    ///
    /// A probe result is kept for the health interval whether it succeeded or
    /// not, so a down backend is not pinged on every call.
    pub async fn check_backend_health(&self) -> bool {
        let backend = &self.inner.backend;
        if !backend.is_configured() {
            return false;
        }
        if let Some(available) = self.inner.health.cached() {
            return available;
        }

        let available = match backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(backend = backend.name(), error = %e, "cache backend probe failed");
                false
            }
        };

        let previous = self.inner.health.record(available);
        match (previous, available) {
            (Availability::Available, true) | (Availability::Unavailable, false) => {}
            (_, true) => tracing::info!(backend = backend.name(), "cache backend available"),
            (_, false) => tracing::warn!(
                backend = backend.name(),
                "cache backend unavailable, using in-memory store"
            ),
        }
        available
    }

    fn backend_failed(&self, op: &'static str, error: &BackendError) {
        metrics::record_backend_error(op);
        let previous = self.inner.health.mark_unavailable();
        if previous == Availability::Unavailable {
            tracing::debug!(op, error = %error, "cache backend command failed");
        } else {
            tracing::warn!(
                op,
                error = %error,
                "cache backend command failed, falling back to in-memory store"
            );
        }
    }

    fn record_hit(&self, key: &str, tier: &'static str) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit(tier);
        tracing::debug!(namespace = namespace(key), tier, "cache hit");
    }

    fn record_miss(&self, key: &str) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
        tracing::debug!(namespace = namespace(key), "cache miss");
    }

    fn resolve_ttl(&self, options: SetOptions) -> CacheResult<u64> {
        match options.ttl_secs.unwrap_or(self.inner.default_ttl_secs) {
            0 => Err(CacheError::InvalidTtl),
            secs => Ok(secs),
        }
    }

    /// Get a value from the cache.
    ///
    /// `Ok(None)` is a miss. A cached JSON `null` is returned as a value
    /// (e.g. `Some(Value::Null)` or `Some(None)` for `T = Option<_>`).
    /// Entries that fail to deserialize are deleted and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        validate_key(key)?;

        if self.check_backend_health().await {
            match self.inner.backend.get(key).await {
                Ok(Some(raw)) => return Ok(self.decode_backend(key, &raw).await),
                Ok(None) => {
                    self.record_miss(key);
                    return Ok(None);
                }
                Err(e) => self.backend_failed("get", &e),
            }
        }

        Ok(self.get_from_memory(key))
    }

    async fn decode_backend<T: DeserializeOwned>(&self, key: &str, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(value) => {
                self.record_hit(key, "redis");
                Some(value)
            }
            Err(_) => {
                metrics::record_corrupt_entry();
                tracing::warn!(
                    namespace = namespace(key),
                    "discarding undecodable cache entry"
                );
                if let Err(e) = self.inner.backend.delete(&[key.to_string()]).await {
                    self.backend_failed("delete", &e);
                }
                self.record_miss(key);
                None
            }
        }
    }

    fn get_from_memory<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(raw) = self.inner.memory.get(key) else {
            self.record_miss(key);
            return None;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.record_hit(key, "memory");
                Some(value)
            }
            Err(_) => {
                metrics::record_corrupt_entry();
                tracing::warn!(
                    namespace = namespace(key),
                    "discarding undecodable in-memory cache entry"
                );
                self.inner.memory.remove(key);
                self.record_miss(key);
                None
            }
        }
    }

    /// Set a value in the cache with TTL.
    ///
    /// The value is serialized before any store is touched; serialization
    /// failures and payloads over 1 MiB are returned as errors.
    pub async fn set<T>(&self, key: &str, value: &T, options: SetOptions) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
    {
        validate_key(key)?;
        let ttl_secs = self.resolve_ttl(options)?;
        let payload = serde_json::to_string(value).map_err(serialization_error)?;
        self.store_serialized(key, payload, ttl_secs).await
    }

    async fn store_serialized(&self, key: &str, payload: String, ttl_secs: u64) -> CacheResult<()> {
        if payload.len() > MAX_VALUE_SIZE {
            return Err(CacheError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_VALUE_SIZE,
            });
        }

        if self.check_backend_health().await {
            match self.inner.backend.set_ex(key, &payload, ttl_secs).await {
                Ok(()) => {
                    // Drop any copy written during an earlier outage.
                    self.inner.memory.remove(key);
                    tracing::debug!(namespace = namespace(key), ttl_secs, "cache set (redis)");
                    return Ok(());
                }
                Err(e) => self.backend_failed("set", &e),
            }
        }

        self.inner
            .memory
            .set(key, payload, Duration::from_secs(ttl_secs));
        metrics::set_memory_entries(self.inner.memory.len());
        tracing::debug!(namespace = namespace(key), ttl_secs, "cache set (memory)");
        Ok(())
    }

    /// Invalidate a cache entry.
    ///
    /// The backend delete is best effort; the in-memory copy is always removed.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;

        if self.check_backend_health().await {
            if let Err(e) = self.inner.backend.delete(&[key.to_string()]).await {
                self.backend_failed("delete", &e);
            }
        }
        self.inner.memory.remove(key);
        Ok(())
    }

    /// Delete every key matching a `*` glob from both stores.
    ///
    /// The backend is walked with cursor-based SCAN and keys are removed in
    /// batches, so large keyspaces never block the server. The in-memory store
    /// is cleaned even when the backend fails.
    pub async fn delete_pattern(&self, pattern: &str) -> CacheResult<()> {
        validate_pattern(pattern)?;
        let regex = glob_to_regex(pattern)?;

        let mut backend_removed = 0;
        if self.check_backend_health().await {
            match self.delete_backend_pattern(pattern).await {
                Ok(count) => backend_removed = count,
                Err(e) => self.backend_failed("delete_pattern", &e),
            }
        }

        let memory_removed = self.inner.memory.remove_matching(&regex);
        metrics::set_memory_entries(self.inner.memory.len());
        tracing::debug!(
            namespace = namespace(pattern),
            backend_removed,
            memory_removed,
            "cache pattern invalidated"
        );
        Ok(())
    }

    async fn delete_backend_pattern(&self, pattern: &str) -> Result<usize, BackendError> {
        let backend = &self.inner.backend;
        let match_pattern = redis_match_pattern(pattern);
        let mut cursor = 0;
        let mut batch: Vec<String> = Vec::with_capacity(SCAN_BATCH_SIZE);
        let mut removed = 0;

        loop {
            let (next, keys) = backend
                .scan(cursor, &match_pattern, SCAN_BATCH_SIZE)
                .await?;
            for key in keys {
                batch.push(key);
                if batch.len() >= SCAN_BATCH_SIZE {
                    backend.delete(&batch).await?;
                    removed += batch.len();
                    batch.clear();
                }
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if !batch.is_empty() {
            backend.delete(&batch).await?;
            removed += batch.len();
        }
        Ok(removed)
    }

    /// Get a value, computing and caching it on a miss.
    ///
    /// Concurrent callers that miss on the same key share one execution of
    /// `compute`: the first registers the computation, the rest await it and
    /// receive the same result (or the same error). The computation runs on
    /// its own tokio task, so it settles and its registration is removed even
    /// when every caller is cancelled. A successful result is written with
    /// `set` semantics before any caller sees it.
    ///
    /// `compute` is invoked without any internal lock held and may call back
    /// into the manager.
    pub async fn cached<T, F, Fut>(&self, key: &str, compute: F, options: SetOptions) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            return Ok(hit);
        }
        let ttl_secs = self.resolve_ttl(options)?;

        let computation = match self.in_flight(key) {
            Some(computation) => computation,
            None => {
                let fut = compute();
                match self.inner.pending.entry(key.to_string()) {
                    // Lost the race to register; `fut` is dropped unpolled.
                    Entry::Occupied(entry) => {
                        metrics::record_dedup_join();
                        entry.get().1.clone()
                    }
                    Entry::Vacant(entry) => {
                        let id = self.inner.next_computation.fetch_add(1, Ordering::Relaxed);
                        let computation = self.start_computation(key.to_string(), id, fut, ttl_secs);
                        entry.insert((id, computation.clone()));
                        computation
                    }
                }
            }
        };

        let value = computation.await?;
        serde_json::from_value(value).map_err(serialization_error)
    }

    fn in_flight(&self, key: &str) -> Option<SharedComputation> {
        let computation = self.inner.pending.get(key)?.1.clone();
        metrics::record_dedup_join();
        tracing::debug!(namespace = namespace(key), "joining in-flight computation");
        Some(computation)
    }

    /// Spawn the computation and return a handle every caller can await.
    ///
    /// Must be called while the pending entry for `key` is held, so the task
    /// cannot deregister before it is registered.
    fn start_computation<T, Fut>(&self, key: String, id: u64, fut: Fut, ttl_secs: u64) -> SharedComputation
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let _registration = PendingRegistration {
                pending: &manager.inner.pending,
                key: &key,
                id,
            };
            let result = fut.await.map_err(|e| CacheError::Compute(Arc::new(e)))?;
            let value = serde_json::to_value(&result).map_err(serialization_error)?;
            let payload = serde_json::to_string(&value).map_err(serialization_error)?;
            manager.store_serialized(&key, payload, ttl_secs).await?;
            Ok::<_, CacheError>(value)
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::Compute(Arc::new(anyhow::anyhow!(
                    "cached computation task failed: {e}"
                )))),
            }
        }
        .boxed()
        .shared()
    }

    /// Drop all in-memory entries and in-flight registrations.
    ///
    /// The backend is not touched.
    pub fn clear_memory(&self) {
        self.inner.memory.clear();
        self.inner.pending.clear();
        metrics::set_memory_entries(0);
        tracing::info!("cleared in-memory cache");
    }

    /// Remove expired in-memory entries now. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.inner.memory.cleanup_expired();
        metrics::set_memory_entries(self.inner.memory.len());
        removed
    }

    /// Flush the whole backend database. Returns whether the flush happened.
    pub(crate) async fn flush_backend(&self) -> bool {
        if !self.check_backend_health().await {
            return false;
        }
        match self.inner.backend.flush().await {
            Ok(()) => true,
            Err(e) => {
                self.backend_failed("flush", &e);
                false
            }
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let backend_available = match self.inner.health.availability() {
            Availability::Unknown => None,
            Availability::Available => Some(true),
            Availability::Unavailable => Some(false),
        };
        CacheStats {
            mode: self.inner.backend.name(),
            backend_available,
            memory_entries: self.inner.memory.len(),
            pending_requests: self.inner.pending.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

/// Removes a computation's pending entry when its task finishes or panics.
struct PendingRegistration<'a> {
    pending: &'a DashMap<String, (u64, SharedComputation)>,
    key: &'a str,
    id: u64,
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        self.pending.remove_if(self.key, |_, (id, _)| *id == self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let cache = CacheManager::memory_only();
        let profile = Profile {
            name: "Ana".into(),
        };
        cache
            .set("student:42:profile", &profile, SetOptions::ttl(300))
            .await
            .unwrap();

        let cached: Option<Profile> = cache.get("student:42:profile").await.unwrap();
        assert_eq!(cached, Some(profile));
        assert_eq!(cache.stats().mode, "memory");
        assert_eq!(cache.stats().memory_entries, 1);
    }

    #[tokio::test]
    async fn test_null_is_not_a_miss() {
        let cache = CacheManager::memory_only();
        cache
            .set("tourist:1", &Value::Null, SetOptions::default())
            .await
            .unwrap();

        let hit: Option<Value> = cache.get("tourist:1").await.unwrap();
        assert_eq!(hit, Some(Value::Null));

        let as_option: Option<Option<String>> = cache.get("tourist:1").await.unwrap();
        assert_eq!(as_option, Some(None));

        let miss: Option<Value> = cache.get("tourist:2").await.unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys_everywhere() {
        let cache = CacheManager::memory_only();
        assert!(matches!(
            cache.get::<Value>("session:1").await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(cache.set("session:1", &1, SetOptions::default()).await.is_err());
        assert!(cache.delete("session:1").await.is_err());
        assert!(cache.delete_pattern("session:*").await.is_err());
        assert_eq!(cache.stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let cache = CacheManager::memory_only();
        let err = cache
            .set("student:1", &1, SetOptions::ttl(0))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidTtl));
    }

    #[tokio::test]
    async fn test_unserializable_value() {
        let cache = CacheManager::memory_only();
        let mut map = BTreeMap::new();
        map.insert(vec![1u8, 2], 1);

        let err = cache
            .set("analytics:bad", &map, SetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
        assert_eq!(cache.stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_oversized_payload() {
        let cache = CacheManager::memory_only();
        let big = "x".repeat(MAX_VALUE_SIZE);
        let err = cache
            .set("analytics:big", &big, SetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::PayloadTooLarge { limit, .. } if limit == MAX_VALUE_SIZE));
        assert_eq!(cache.stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_memory_entry_is_a_miss() {
        let cache = CacheManager::memory_only();
        cache
            .set("student:1", &"text", SetOptions::default())
            .await
            .unwrap();

        let wrong_type: Option<u32> = cache.get("student:1").await.unwrap();
        assert_eq!(wrong_type, None);
        assert_eq!(cache.stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_clear_memory() {
        let cache = CacheManager::memory_only();
        cache.set("match:1", &1, SetOptions::default()).await.unwrap();
        cache.set("match:2", &2, SetOptions::default()).await.unwrap();
        cache.clear_memory();
        assert_eq!(cache.stats().memory_entries, 0);
        assert_eq!(cache.get::<u32>("match:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_null_backend_is_never_probed() {
        let cache = CacheManager::memory_only();
        assert!(!cache.check_backend_health().await);
        assert_eq!(cache.stats().backend_available, None);
    }

    #[tokio::test]
    async fn test_hit_rate() {
        let cache = CacheManager::memory_only();
        cache.set("student:1", &1, SetOptions::default()).await.unwrap();
        let _: Option<u32> = cache.get("student:1").await.unwrap();
        let _: Option<u32> = cache.get("student:2").await.unwrap();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }
}
