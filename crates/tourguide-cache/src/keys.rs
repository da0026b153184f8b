//! Key builders for the marketplace's cache entries.
//!
//! Identifiers are sanitized before interpolation so that a caller-supplied
//! id can never introduce glob syntax into a key or an invalidation pattern.

use crate::error::{CacheError, CacheResult};

/// Strip glob metacharacters (`* ? [ ]`) and surrounding whitespace.
///
/// Fails when nothing usable is left.
pub fn sanitize_identifier(id: &str) -> CacheResult<String> {
    let cleaned: String = id
        .trim()
        .chars()
        .filter(|c| !matches!(c, '*' | '?' | '[' | ']'))
        .collect();
    if cleaned.is_empty() {
        return Err(CacheError::InvalidIdentifier(
            "identifier is empty after sanitization",
        ));
    }
    Ok(cleaned)
}

pub fn student(id: &str) -> CacheResult<String> {
    Ok(format!("student:{}", sanitize_identifier(id)?))
}

pub fn student_profile(id: &str) -> CacheResult<String> {
    Ok(format!("student:{}:profile", sanitize_identifier(id)?))
}

/// Requests assigned to a student guide.
pub fn student_requests(id: &str) -> CacheResult<String> {
    Ok(format!("student:{}:requests", sanitize_identifier(id)?))
}

/// A filtered listing of students, e.g. `students:list:city=lisbon`.
pub fn students_list(filter: &str) -> CacheResult<String> {
    Ok(format!("students:list:{}", sanitize_identifier(filter)?))
}

pub fn tourist(id: &str) -> CacheResult<String> {
    Ok(format!("tourist:{}", sanitize_identifier(id)?))
}

pub fn tourist_requests(id: &str) -> CacheResult<String> {
    Ok(format!("tourist:{}:requests", sanitize_identifier(id)?))
}

pub fn request(id: &str) -> CacheResult<String> {
    Ok(format!("request:{}", sanitize_identifier(id)?))
}

pub fn match_record(id: &str) -> CacheResult<String> {
    Ok(format!("match:{}", sanitize_identifier(id)?))
}

pub fn admin_dashboard() -> String {
    "dashboard:admin".to_string()
}

pub fn student_dashboard(id: &str) -> CacheResult<String> {
    Ok(format!("dashboard:student:{}", sanitize_identifier(id)?))
}

pub fn tourist_dashboard(id: &str) -> CacheResult<String> {
    Ok(format!("dashboard:tourist:{}", sanitize_identifier(id)?))
}

pub fn analytics(metric: &str) -> CacheResult<String> {
    Ok(format!("analytics:{}", sanitize_identifier(metric)?))
}

pub fn verification(student_id: &str) -> CacheResult<String> {
    Ok(format!("verification:{}", sanitize_identifier(student_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_key;

    #[test]
    fn test_sanitize_strips_glob_characters() {
        assert_eq!(sanitize_identifier("abc*").unwrap(), "abc");
        assert_eq!(sanitize_identifier(" a?b[c]d ").unwrap(), "abcd");
        assert!(matches!(
            sanitize_identifier("*?[]"),
            Err(CacheError::InvalidIdentifier(_))
        ));
        assert!(sanitize_identifier("   ").is_err());
    }

    #[test]
    fn test_builders_produce_valid_keys() {
        let keys = [
            student("42").unwrap(),
            student_profile("42").unwrap(),
            student_requests("42").unwrap(),
            students_list("city=lisbon").unwrap(),
            tourist("7").unwrap(),
            tourist_requests("7").unwrap(),
            request("r1").unwrap(),
            match_record("m1").unwrap(),
            admin_dashboard(),
            student_dashboard("42").unwrap(),
            tourist_dashboard("7").unwrap(),
            analytics("bookings").unwrap(),
            verification("42").unwrap(),
        ];
        for key in &keys {
            assert!(validate_key(key).is_ok(), "{key}");
        }
        assert_eq!(student_profile("4*2").unwrap(), "student:42:profile");
    }
}
