//! Error types for the object cache
//!
//! Provides unified error handling using thiserror. A cache miss is never an
//! error: lookups return `Ok(None)` for absent entries.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the object cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The declared type name of a cached entry is not registered in this process
    #[error("Unresolvable cached type: {0}")]
    TypeNotFound(String),

    /// A value type that cannot be named was passed for caching
    #[error("Unnameable type cannot be cached, declare a named type instead: {0}")]
    UnnameableType(String),

    /// The cached entry was decoded as a different type than requested
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the caller asked for
        expected: String,
        /// Type recorded in the entry state
        found: String,
    },

    /// Invalid key or expiration policy
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Value or state text could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing key-value store reported a failure
    #[error("Backend error: {0}")]
    Backend(String),
}

// == Result Type Alias ==
/// Convenience Result type for the object cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_not_found_message() {
        let err = CacheError::TypeNotFound("app::Gone".to_string());
        assert_eq!(err.to_string(), "Unresolvable cached type: app::Gone");
    }

    #[test]
    fn test_serialization_error_converts() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
