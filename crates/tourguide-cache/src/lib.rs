//! Namespaced cache engine for the tourguide marketplace.
//!
//! ## Architecture
//!
//! - **Backend (Redis)**: shared across instances, reached through the
//!   [`CacheBackend`] trait
//! - **In-memory store**: per-instance fallback used whenever the backend is
//!   missing, unhealthy or failing
//! - **Request coalescing**: concurrent [`CacheManager::cached`] calls for the
//!   same key share one computation
//!
//! Every key must live under an allowlisted namespace (`student:`,
//! `tourist:`, ...). Pattern deletes must name a namespace before any
//! wildcard, so a stray `*` can never wipe the shared cache.

pub mod backend;
pub mod config;
pub mod error;
pub mod health;
pub mod invalidation;
pub mod keys;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod observability;
pub mod validation;

use std::sync::Arc;

pub use backend::{CacheBackend, NullBackend, RedisBackend};
pub use config::{AppConfig, CacheSettings, Environment, RedisConfig};
pub use error::{BackendError, CacheError, CacheResult};
pub use invalidation::CacheInvalidation;
pub use manager::{CacheManager, CacheManagerBuilder, CacheStats, SetOptions};
pub use observability::{init_tracing, init_tracing_with_level};
pub use validation::{validate_key, validate_pattern};

/// Create a cache manager based on configuration.
///
/// ## Cache Modes
///
/// - **No Redis URL**: in-memory only
/// - **Redis URL set**: Redis-backed with in-memory fallback
///
/// No connection is opened here. If the pool cannot even be built (for
/// example a malformed URL) the manager runs in-memory only.
pub fn create_cache_manager(config: &AppConfig) -> CacheManager {
    let backend: Arc<dyn CacheBackend> = match config.redis.url.as_deref() {
        None => {
            tracing::info!("Redis not configured, using in-memory cache only");
            Arc::new(NullBackend)
        }
        Some(url) => match RedisBackend::new(url, &config.redis) {
            Ok(backend) => {
                tracing::info!(pool_size = config.redis.pool_size, "Redis cache backend configured");
                Arc::new(backend)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to create Redis pool. Falling back to in-memory cache."
                );
                Arc::new(NullBackend)
            }
        },
    };

    CacheManager::builder(backend)
        .default_ttl_secs(config.cache.default_ttl_secs)
        .environment(config.environment)
        .build()
}
