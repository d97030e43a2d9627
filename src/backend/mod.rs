//! Backend Module
//!
//! The string key-value primitives the object cache is layered on.

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;

/// Remote key-value store holding opaque string records with a TTL.
///
/// Implementations own transport, retries and timeouts; the cache never
/// retries on its own.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a record, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a record that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Resets the TTL of an existing record. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Deletes a record. Returns false if the key was absent.
    async fn delete(&self, key: &str) -> Result<bool>;
}
