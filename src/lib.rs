//! Redis Object Cache - typed object caching over a string key-value store
//!
//! Stores each value with a companion state record carrying its declared
//! type and expiration policy, renews sliding entries on read, and resolves
//! declared types through an explicit registry.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
pub mod telemetry;

pub use backend::{KeyValueStore, MemoryStore};
pub use cache::{CacheStore, CachedValue, Expiration, TypeRegistry};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_cleanup_task, spawn_configured_cleanup_task};
