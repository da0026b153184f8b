//! In-memory fallback store.
//!
//! Holds serialized values whenever the remote backend is unavailable. Expiry
//! is lazy: entries are checked on read, and the whole table is swept once it
//! grows past a threshold. There is no background timer.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use regex::Regex;

use crate::error::{CacheError, CacheResult};

/// Size above which a write triggers a sweep of expired entries.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1000;

/// Serialized value with an absolute expiry.
#[derive(Clone, Debug)]
pub struct MemoryEntry {
    pub value: String,
    pub expires_at: Instant,
}

impl MemoryEntry {
    pub fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local key → entry table shared by every caller of a manager.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
    sweep_threshold: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl MemoryStore {
    pub fn new(sweep_threshold: usize) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_threshold,
        }
    }

    /// Read a live entry. Expired entries are removed and reported as missing.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
        }
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value, ttl));

        if self.entries.len() > self.sweep_threshold {
            let removed = self.cleanup_expired();
            tracing::debug!(
                removed,
                remaining = self.entries.len(),
                "swept expired in-memory cache entries"
            );
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every key matched by `regex` (see [`glob_to_regex`]).
    /// Returns the number removed.
    pub fn remove_matching(&self, regex: &Regex) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if regex.is_match(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.expires_at <= now {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Convert a `*` glob into an anchored regex.
///
/// Everything except `*` is matched literally.
pub fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
        .map_err(|_| CacheError::InvalidPattern("pattern could not be compiled"))
}
