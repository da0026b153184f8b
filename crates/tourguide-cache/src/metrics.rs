//! Cache metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "tourguide_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "tourguide_cache_misses_total";
    pub const CACHE_BACKEND_ERRORS_TOTAL: &str = "tourguide_cache_backend_errors_total";
    pub const CACHE_CORRUPT_ENTRIES_TOTAL: &str = "tourguide_cache_corrupt_entries_total";
    pub const CACHE_DEDUP_JOINS_TOTAL: &str = "tourguide_cache_dedup_joins_total";
    pub const CACHE_MEMORY_ENTRIES: &str = "tourguide_cache_memory_entries";
}

/// Record a cache hit.
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a failed backend command.
pub fn record_backend_error(op: &'static str) {
    counter!(names::CACHE_BACKEND_ERRORS_TOTAL, "op" => op).increment(1);
}

pub fn record_corrupt_entry() {
    counter!(names::CACHE_CORRUPT_ENTRIES_TOTAL).increment(1);
}

/// Record a caller that joined an in-flight computation.
pub fn record_dedup_join() {
    counter!(names::CACHE_DEDUP_JOINS_TOTAL).increment(1);
}

/// Set the number of in-memory entries.
pub fn set_memory_entries(count: usize) {
    gauge!(names::CACHE_MEMORY_ENTRIES).set(count as f64);
}
