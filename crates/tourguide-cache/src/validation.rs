//! Key and pattern validation.
//!
//! Every key handled by the cache must live under one of the allowlisted
//! namespaces so that unrelated data sharing the same Redis instance cannot
//! collide with (or be wiped by) marketplace entries. Error messages describe
//! the rule that failed and never echo the input.

use crate::error::{CacheError, CacheResult};

/// Namespaces a key may start with.
pub const ALLOWED_PREFIXES: &[&str] = &[
    "student:",
    "tourist:",
    "request:",
    "match:",
    "dashboard:",
    "students:",
    "analytics:",
    "verification:",
];

/// Maximum key and pattern length in bytes.
pub const MAX_KEY_LENGTH: usize = 256;

fn has_control_chars(s: &str) -> bool {
    s.chars().any(|c| (c as u32) < 0x20)
}

fn has_allowed_prefix(s: &str) -> bool {
    ALLOWED_PREFIXES.iter().any(|prefix| s.starts_with(prefix))
}

/// Validate an exact cache key.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey("key exceeds 256 bytes"));
    }
    if has_control_chars(key) {
        return Err(CacheError::InvalidKey("key contains control characters"));
    }
    if !has_allowed_prefix(key) {
        return Err(CacheError::InvalidKey("key namespace is not allowed"));
    }
    Ok(())
}

/// Validate a glob pattern used for bulk deletion.
///
/// The literal text before the first `*` must already select an allowlisted
/// namespace, so `*`, `**`, `*:rest` and `stud*` are all rejected.
pub fn validate_pattern(pattern: &str) -> CacheResult<()> {
    if pattern.is_empty() {
        return Err(CacheError::InvalidPattern("pattern must not be empty"));
    }
    if pattern == "*" || pattern == "**" || pattern.starts_with('*') {
        return Err(CacheError::InvalidPattern(
            "pattern must not start with a wildcard",
        ));
    }
    if pattern.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidPattern("pattern exceeds 256 bytes"));
    }
    if has_control_chars(pattern) {
        return Err(CacheError::InvalidPattern(
            "pattern contains control characters",
        ));
    }
    let literal = pattern.split('*').next().unwrap_or_default();
    if !has_allowed_prefix(literal) {
        return Err(CacheError::InvalidPattern(
            "pattern namespace is not allowed",
        ));
    }
    Ok(())
}
