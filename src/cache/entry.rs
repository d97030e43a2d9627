//! Cache Entry Module
//!
//! Write intent handed to the store: a value, its derived keys and its state.

use crate::cache::{CacheEntryState, CacheKey};

// == Cache Entry ==
/// A value ready to be written, with the keys and state it will be stored under.
///
/// Never persisted as such; the store splits it into a value record and a
/// state record.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The value to cache
    pub value: T,
    /// Derived value and state keys
    pub key: CacheKey,
    /// Metadata written to the state record
    pub state: CacheEntryState,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    pub fn new(key: CacheKey, value: T, state: CacheEntryState) -> Self {
        Self { value, key, state }
    }

    /// Store key of the value record.
    pub fn value_key(&self) -> &str {
        &self.key.key
    }

    /// Store key of the state record.
    pub fn state_key(&self) -> &str {
        &self.key.state_key
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expiration;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_entry_keys() {
        let state =
            CacheEntryState::new("u32", Expiration::absolute_in(Duration::from_secs(5)), Utc::now())
                .unwrap();
        let entry = CacheEntry::new(CacheKey::new("counter"), 7u32, state);

        assert_eq!(entry.value, 7);
        assert_eq!(entry.value_key(), "counter");
        assert_eq!(entry.state_key(), "counter_state");
    }
}
