//! Cache Module
//!
//! Typed object cache with absolute and sliding expiration, stored as a value
//! record plus a state record in a string key-value store.

mod entry;
mod key;
mod registry;
mod state;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use registry::{validate_type_name, CachedValue, Decoder, TypeRegistry};
pub use state::{CacheEntryState, Expiration};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Default suffix appended to the value key to form the state key
pub const DEFAULT_STATE_SUFFIX: &str = "_state";
