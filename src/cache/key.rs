//! Cache Key Module
//!
//! Derives the value record key and the state record key from one logical key.

use crate::cache::DEFAULT_STATE_SUFFIX;

// == Cache Key ==
/// The pair of store keys backing one logical cache key.
///
/// Derivation depends only on the logical key, the prefix and the suffix, so
/// every process configured the same way addresses the same records. Any
/// string is a valid logical key; limits are left to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Store key of the value record
    pub key: String,
    /// Store key of the state record
    pub state_key: String,
}

impl CacheKey {
    /// Derives keys with no prefix and the default state suffix.
    pub fn new(logical_key: &str) -> Self {
        Self::derive(logical_key, "", DEFAULT_STATE_SUFFIX)
    }

    /// Derives keys as `prefix + logical` and `prefix + logical + suffix`.
    pub fn derive(logical_key: &str, prefix: &str, state_suffix: &str) -> Self {
        let key = format!("{}{}", prefix, logical_key);
        let state_key = format!("{}{}", key, state_suffix);
        Self { key, state_key }
    }
}
