//! Cache Store Module
//!
//! Typed get/set/remove over a string key-value store. Each entry is split
//! into a value record and a state record that share one TTL.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::KeyValueStore;
use crate::cache::registry::validate_type_name;
use crate::cache::stats::StatsRecorder;
use crate::cache::{
    CacheEntry, CacheEntryState, CacheKey, CacheStats, CachedValue, Expiration, TypeRegistry,
};
use crate::config::Config;
use crate::error::Result;

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.is_empty())
}

// == Cache Store ==
/// Object cache over a [`KeyValueStore`].
///
/// The state record is the existence gate: an entry is present only while
/// its state record is. Writes to the two records are not atomic, so a
/// fault between them can leave one without the other; both operations
/// then report a miss and the leftover record lapses with its own TTL.
pub struct CacheStore {
    /// Backing key-value store
    backend: Arc<dyn KeyValueStore>,
    /// Declared type name -> decoder
    registry: Arc<TypeRegistry>,
    /// Namespace prepended to derived keys
    key_prefix: String,
    /// Suffix forming the state key
    state_suffix: String,
    /// Operation counters
    stats: StatsRecorder,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store with the default key layout.
    pub fn new(backend: Arc<dyn KeyValueStore>, registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(backend, registry, &Config::default())
    }

    /// Creates a store using the key layout from `config`.
    pub fn with_config(
        backend: Arc<dyn KeyValueStore>,
        registry: Arc<TypeRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            registry,
            key_prefix: config.key_prefix.clone(),
            state_suffix: config.state_suffix.clone(),
            stats: StatsRecorder::default(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Derives the value and state keys for a logical key.
    pub fn cache_key(&self, key: &str) -> CacheKey {
        CacheKey::derive(key, &self.key_prefix, &self.state_suffix)
    }

    // == Set ==
    /// Caches `value` under `key` and hands it back.
    ///
    /// The state records the registered name of `T`, or its compiler name
    /// when `T` is not registered.
    pub async fn set<T>(&self, key: &str, value: T, expiration: Expiration) -> Result<T>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let type_name = self.registry.declared_name::<T>();
        let state = CacheEntryState::new(type_name, expiration, Utc::now())?;
        self.set_entry(CacheEntry::new(self.cache_key(key), value, state))
            .await
    }

    /// Writes a prepared entry and hands its value back.
    ///
    /// The declared type name must be one a reader can resolve back to `T`.
    /// An entry whose expiration has already passed is not written; any
    /// records left under its keys are deleted instead.
    pub async fn set_entry<T>(&self, entry: CacheEntry<T>) -> Result<T>
    where
        T: Serialize + Send + Sync + 'static,
    {
        validate_type_name(&entry.state.type_name)?;
        self.registry.check_declared::<T>(&entry.state.type_name)?;

        let ttl = match entry.state.compute_ttl(Utc::now()) {
            Some(ttl) => ttl,
            None => {
                debug!(key = entry.value_key(), "entry already expired, clearing instead of writing");
                self.backend.delete(entry.value_key()).await?;
                self.backend.delete(entry.state_key()).await?;
                self.stats.record_skipped_write();
                return Ok(entry.value);
            }
        };

        let value_json = serde_json::to_string(&entry.value)?;
        let state_json = serde_json::to_string(&entry.state)?;

        self.backend.set(entry.value_key(), value_json, ttl).await?;
        self.backend.set(entry.state_key(), state_json, ttl).await?;

        self.stats.record_write();
        debug!(
            key = entry.value_key(),
            type_name = %entry.state.type_name,
            sliding = entry.state.is_sliding,
            ttl_ms = ttl.as_millis() as u64,
            "cached entry"
        );
        Ok(entry.value)
    }

    // == Get ==
    /// Reads the entry under `key`.
    ///
    /// Returns `Ok(None)` on a miss. Sliding entries are renewed: the state
    /// record is rewritten and the value record's TTL refreshed to match.
    pub async fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        let cache_key = self.cache_key(key);

        let state_json = match non_empty(self.backend.get(&cache_key.state_key).await?) {
            Some(json) => json,
            None => {
                self.stats.record_miss();
                debug!(key, "cache miss");
                return Ok(None);
            }
        };
        let mut state: CacheEntryState = serde_json::from_str(&state_json)?;

        let value_json = match non_empty(self.backend.get(&cache_key.key).await?) {
            Some(json) => json,
            None => {
                self.stats.record_miss();
                warn!(key, "state record without value record, treating as miss");
                return Ok(None);
            }
        };

        let decoder = self.registry.resolve(&state.type_name)?;
        let value = decoder(&value_json)?;

        if state.is_sliding {
            self.renew(&cache_key, &mut state).await?;
        }

        self.stats.record_hit();
        debug!(key, type_name = %state.type_name, "cache hit");
        Ok(Some(CachedValue::new(state.type_name, value)))
    }

    /// Reads the entry under `key` as a `T`.
    ///
    /// Fails with a type mismatch if the entry was cached as another type.
    pub async fn get_as<T: 'static>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .await?
            .map(CachedValue::downcast::<T>)
            .transpose()
    }

    async fn renew(&self, cache_key: &CacheKey, state: &mut CacheEntryState) -> Result<()> {
        let now = Utc::now();
        state.renew_on_access(now);

        let ttl = match state.compute_ttl(now) {
            Some(ttl) => ttl,
            None => return Ok(()),
        };

        let state_json = serde_json::to_string(&state)?;
        self.backend.set(&cache_key.state_key, state_json, ttl).await?;
        if !self.backend.expire(&cache_key.key, ttl).await? {
            warn!(key = %cache_key.key, "value record vanished during renewal");
        }

        self.stats.record_renewal();
        Ok(())
    }

    // == Remove ==
    /// Deletes the entry under `key` and returns its value.
    ///
    /// The value is decoded without its declared type, so only its structure
    /// survives. It is decoded before anything is deleted: an undecodable
    /// value fails the call and leaves both records in place. On a miss both
    /// records are still deleted, clearing any leftover from a partial write.
    pub async fn remove(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let cache_key = self.cache_key(key);

        let state_present = non_empty(self.backend.get(&cache_key.state_key).await?).is_some();
        let value_json = if state_present {
            non_empty(self.backend.get(&cache_key.key).await?)
        } else {
            None
        };

        let value = value_json
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;

        self.backend.delete(&cache_key.key).await?;
        self.backend.delete(&cache_key.state_key).await?;

        let value = match value {
            Some(value) => value,
            None => {
                debug!(key, "remove found no entry");
                return Ok(None);
            }
        };

        self.stats.record_removal();
        debug!(key, "removed entry");
        Ok(Some(value))
    }

    // == Stats ==
    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::error::CacheError;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
    }

    fn user() -> User {
        User {
            id: 1,
            name: "A".to_string(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, CacheStore) {
        let backend = Arc::new(MemoryStore::new());
        let registry = Arc::new(TypeRegistry::new());
        registry.register::<User>("app.User").unwrap();
        registry.register::<Order>("app.Order").unwrap();
        let store = CacheStore::new(backend.clone(), registry);
        (backend, store)
    }

    fn minutes(n: u64) -> Expiration {
        Expiration::absolute_in(Duration::from_secs(n * 60))
    }

    #[tokio::test]
    async fn test_set_returns_value() {
        let (_, store) = setup();

        let returned = store.set("user:1", user(), minutes(5)).await.unwrap();
        assert_eq!(returned, user());
    }

    #[tokio::test]
    async fn test_set_writes_both_records_with_equal_ttl() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();

        let value_expiry = backend.expires_at("user:1").await.unwrap();
        let state_expiry = backend.expires_at("user:1_state").await.unwrap();
        let drift = (value_expiry - state_expiry).num_milliseconds().abs();
        assert!(drift < 50, "value and state TTL drifted by {}ms", drift);
    }

    #[tokio::test]
    async fn test_state_record_contents() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();

        let state_json = backend.get("user:1_state").await.unwrap().unwrap();
        let state: CacheEntryState = serde_json::from_str(&state_json).unwrap();
        assert_eq!(state.type_name, "app.User");
        assert!(!state.is_sliding);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        let value = store.get("user:1").await.unwrap().unwrap();

        assert_eq!(value.type_name(), "app.User");
        assert_eq!(value.downcast_ref::<User>(), Some(&user()));
    }

    #[tokio::test]
    async fn test_get_as() {
        let (_, store) = setup();

        store.set("order:9", Order { id: 9 }, minutes(1)).await.unwrap();

        assert_eq!(store.get_as::<Order>("order:9").await.unwrap(), Some(Order { id: 9 }));
        assert!(matches!(
            store.get_as::<User>("order:9").await,
            Err(CacheError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_, store) = setup();

        assert!(store.get("nonexistent").await.unwrap().is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (_, store) = setup();

        store.set("k", Order { id: 1 }, minutes(1)).await.unwrap();
        store.set("k", user(), minutes(1)).await.unwrap();

        assert_eq!(store.get_as::<User>("k").await.unwrap(), Some(user()));
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_on_read() {
        let (_, store) = setup();

        #[derive(Serialize)]
        struct Unregistered {
            flag: bool,
        }

        store.set("u", Unregistered { flag: true }, minutes(1)).await.unwrap();

        let result = store.get("u").await;
        assert!(matches!(result, Err(CacheError::TypeNotFound(name)) if name.contains("Unregistered")));
    }

    #[tokio::test]
    async fn test_type_declared_in_async_body_round_trips_once_registered() {
        let (_, store) = setup();

        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Local {
            flag: bool,
        }

        assert!(std::any::type_name::<Local>().contains("{{closure}}"));
        store.set("local", Local { flag: true }, minutes(1)).await.unwrap();
        assert!(matches!(
            store.get("local").await,
            Err(CacheError::TypeNotFound(_))
        ));

        store.registry().register_default::<Local>().unwrap();
        assert_eq!(
            store.get_as::<Local>("local").await.unwrap(),
            Some(Local { flag: true })
        );
    }

    #[tokio::test]
    async fn test_unnameable_type_rejected_before_write() {
        let (backend, store) = setup();

        let result = store.set("pair", (1u32, "a".to_string()), minutes(1)).await;

        assert!(matches!(result, Err(CacheError::UnnameableType(_))));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_unnameable_state_type_rejected_by_set_entry() {
        let (backend, store) = setup();

        let state = CacheEntryState::new("[u8; 2]", minutes(1), Utc::now()).unwrap();
        let entry = CacheEntry::new(store.cache_key("bytes"), [1u8, 2u8], state);

        assert!(matches!(
            store.set_entry(entry).await,
            Err(CacheError::UnnameableType(_))
        ));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_entry_rejects_state_naming_another_type() {
        let (backend, store) = setup();

        let state = CacheEntryState::new("app.Order", minutes(1), Utc::now()).unwrap();
        let entry = CacheEntry::new(store.cache_key("user:1"), user(), state);
        assert!(matches!(
            store.set_entry(entry).await,
            Err(CacheError::TypeMismatch { expected, .. }) if expected == "app.Order"
        ));

        let state = CacheEntryState::new("app.Unknown", minutes(1), Utc::now()).unwrap();
        let entry = CacheEntry::new(store.cache_key("user:1"), user(), state);
        assert!(matches!(
            store.set_entry(entry).await,
            Err(CacheError::TypeMismatch { .. })
        ));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_set_clears_previous_entry() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        let past = Expiration::absolute(Utc::now() - chrono::Duration::seconds(1));
        let returned = store.set("user:1", user(), past).await.unwrap();

        assert_eq!(returned, user());
        assert!(store.get("user:1").await.unwrap().is_none());
        assert!(backend.is_empty().await);
        assert_eq!(store.stats().skipped_writes, 1);
    }

    #[tokio::test]
    async fn test_sliding_get_renews_both_records() {
        let (backend, store) = setup();
        let sliding = Expiration::sliding(Duration::from_secs(30)).unwrap();

        store.set("user:1", user(), sliding).await.unwrap();
        let before = backend.expires_at("user:1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        store.get("user:1").await.unwrap().unwrap();

        let value_expiry = backend.expires_at("user:1").await.unwrap();
        let state_expiry = backend.expires_at("user:1_state").await.unwrap();
        assert!(value_expiry > before);
        assert!((value_expiry - state_expiry).num_milliseconds().abs() < 50);

        let state_json = backend.get("user:1_state").await.unwrap().unwrap();
        let state: CacheEntryState = serde_json::from_str(&state_json).unwrap();
        assert_eq!(state.access_count, 1);
        assert_eq!(store.stats().renewals, 1);
    }

    #[tokio::test]
    async fn test_absolute_get_does_not_renew() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        let before = backend.expires_at("user:1").await.unwrap();

        store.get("user:1").await.unwrap().unwrap();

        assert_eq!(backend.expires_at("user:1").await.unwrap(), before);
        assert_eq!(store.stats().renewals, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        let removed = store.remove("user:1").await.unwrap().unwrap();

        assert_eq!(removed["id"], 1);
        assert_eq!(removed["name"], "A");
        assert!(store.get("user:1").await.unwrap().is_none());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_undecodable_value_keeps_records() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        backend
            .set("user:1", "{not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            store.remove("user:1").await,
            Err(CacheError::Serialization(_))
        ));
        assert!(backend.contains("user:1").await);
        assert!(backend.contains("user:1_state").await);
        assert_eq!(store.stats().removals, 0);
    }

    #[tokio::test]
    async fn test_remove_nonexistent() {
        let (_, store) = setup();
        assert!(store.remove("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_orphan_value_record_is_a_miss_and_removed() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        backend.delete("user:1_state").await.unwrap();

        assert!(store.get("user:1").await.unwrap().is_none());
        assert!(store.remove("user:1").await.unwrap().is_none());
        assert!(!backend.contains("user:1").await);
    }

    #[tokio::test]
    async fn test_orphan_state_record_is_a_miss() {
        let (backend, store) = setup();

        store.set("user:1", user(), minutes(5)).await.unwrap();
        backend.delete("user:1").await.unwrap();

        assert!(store.get("user:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_key_prefix_from_config() {
        let backend = Arc::new(MemoryStore::new());
        let registry = Arc::new(TypeRegistry::new());
        registry.register::<Order>("app.Order").unwrap();
        let config = Config {
            key_prefix: "shop:".to_string(),
            state_suffix: "#meta".to_string(),
            ..Config::default()
        };
        let store = CacheStore::with_config(backend.clone(), registry, &config);

        store.set("order:1", Order { id: 1 }, minutes(1)).await.unwrap();

        assert!(backend.contains("shop:order:1").await);
        assert!(backend.contains("shop:order:1#meta").await);
    }

    #[tokio::test]
    async fn test_any_key_is_usable() {
        let (_, store) = setup();

        assert!(store.get("").await.unwrap().is_none());
        assert!(store.remove("").await.unwrap().is_none());

        let long_key = "k".repeat(300);
        store.set(&long_key, user(), minutes(1)).await.unwrap();
        assert_eq!(store.get_as::<User>(&long_key).await.unwrap(), Some(user()));
    }
}
