//! In-Memory Backend
//!
//! HashMap-backed key-value store with per-record TTL, used for tests and
//! single-process deployments.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::backend::KeyValueStore;
use crate::error::{CacheError, Result};

// == Stored Record ==
#[derive(Debug, Clone)]
struct StoredRecord {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredRecord {
    /// A record is expired once the current time reaches its expiration.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    if ttl.is_zero() {
        return Err(CacheError::Backend("TTL must be positive".to_string()));
    }
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CacheError::Backend(format!("TTL out of range: {:?}", ttl)))
}

// == Memory Store ==
/// In-process key-value store enforcing TTL on every access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Expires At ==
    /// Expiration instant of a live record.
    pub async fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        let records = self.records.read().await;
        records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.expires_at)
    }

    /// Returns true if a live record exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.expires_at(key).await.is_some()
    }

    // == Cleanup Expired ==
    /// Removes all expired records.
    ///
    /// Returns the number of records removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }

    // == Length ==
    /// Number of stored records, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        {
            let records = self.records.read().await;
            match records.get(key) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.value.clone())),
                Some(_) => {}
            }
        }

        // Drop the expired record lazily
        let mut records = self.records.write().await;
        if records.get(key).is_some_and(|record| record.is_expired(now)) {
            records.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = expiry_from(Utc::now(), ttl)?;
        self.records
            .write()
            .await
            .insert(key.to_string(), StoredRecord { value, expires_at });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = expiry_from(now, ttl)?;
        let mut records = self.records.write().await;
        let live = records.get(key).map(|record| !record.is_expired(now));
        match live {
            Some(true) => {
                if let Some(record) = records.get_mut(key) {
                    record.expires_at = expires_at;
                }
                Ok(true)
            }
            Some(false) => {
                records.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Utc::now();
        let removed = self.records.write().await.remove(key);
        Ok(removed.is_some_and(|record| !record.is_expired(now)))
    }
}
