//! Invalidation helpers.
//!
//! Each helper turns a business event ("student 42 changed") into the set of
//! pattern deletions that removes the entity's own entries plus the
//! denormalized views (lists, dashboards, aggregates) that embed a copy of it.
//! Identifiers go through [`sanitize_identifier`] first, so `"42*"` can never
//! widen a delete beyond `student:42`.

use crate::error::CacheResult;
use crate::keys::sanitize_identifier;
use crate::manager::CacheManager;

/// Invalidation entry points bound to a [`CacheManager`].
#[derive(Clone, Debug)]
pub struct CacheInvalidation {
    cache: CacheManager,
}

impl CacheInvalidation {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    /// Delete `prefix` itself and everything below `prefix:`.
    async fn scope(&self, prefix: &str) -> CacheResult<()> {
        self.cache.delete_pattern(prefix).await?;
        self.cache.delete_pattern(&format!("{prefix}:*")).await
    }

    /// A student guide's profile changed.
    pub async fn student(&self, id: &str) -> CacheResult<()> {
        let id = sanitize_identifier(id)?;
        self.scope(&format!("student:{id}")).await?;
        self.scope(&format!("dashboard:student:{id}")).await?;
        self.cache.delete_pattern("students:*").await?;
        self.scope("dashboard:admin").await
    }

    /// A tourist's profile changed.
    pub async fn tourist(&self, id: &str) -> CacheResult<()> {
        let id = sanitize_identifier(id)?;
        self.scope(&format!("tourist:{id}")).await?;
        self.scope(&format!("dashboard:tourist:{id}")).await?;
        self.scope("dashboard:admin").await
    }

    /// A booking request was created or changed status.
    ///
    /// Requests appear on the dashboards of both parties and in analytics.
    pub async fn request(&self, id: &str) -> CacheResult<()> {
        let id = sanitize_identifier(id)?;
        self.scope(&format!("request:{id}")).await?;
        self.dashboards().await?;
        self.analytics().await
    }

    /// A request was matched to a guide, or a match was accepted/rejected.
    pub async fn matching(&self, id: &str) -> CacheResult<()> {
        let id = sanitize_identifier(id)?;
        self.scope(&format!("match:{id}")).await?;
        self.dashboards().await?;
        self.analytics().await
    }

    /// A student's verification status changed.
    pub async fn verification(&self, student_id: &str) -> CacheResult<()> {
        let id = sanitize_identifier(student_id)?;
        self.scope(&format!("verification:{id}")).await?;
        self.student(&id).await
    }

    /// Student listings and search results.
    pub async fn students_list(&self) -> CacheResult<()> {
        self.cache.delete_pattern("students:*").await
    }

    pub async fn dashboards(&self) -> CacheResult<()> {
        self.cache.delete_pattern("dashboard:*").await
    }

    pub async fn analytics(&self) -> CacheResult<()> {
        self.cache.delete_pattern("analytics:*").await
    }

    /// Clear everything.
    ///
    /// The in-memory store is always cleared. The shared backend is flushed
    /// only when `confirm` is true; without it the flush is skipped, and in
    /// production the refusal is logged as a warning. Returns whether the
    /// backend was flushed.
    pub async fn all(&self, confirm: bool) -> CacheResult<bool> {
        self.cache.clear_memory();

        if !confirm {
            if self.cache.environment().is_production() {
                tracing::warn!("refusing to flush production cache backend without confirmation");
            } else {
                tracing::info!("backend flush skipped, confirmation not given");
            }
            return Ok(false);
        }

        let flushed = self.cache.flush_backend().await;
        if flushed {
            tracing::warn!(
                environment = ?self.cache.environment(),
                "flushed entire cache backend"
            );
        }
        Ok(flushed)
    }
}
