//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;

use crate::cache::DEFAULT_STATE_SUFFIX;

/// Object cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace prepended to both derived store keys
    pub key_prefix: String,
    /// Suffix appended to the value key to form the state key
    pub state_suffix: String,
    /// Background sweep interval in seconds for the in-memory backend
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_KEY_PREFIX` - Key namespace (default: empty)
    /// - `CACHE_STATE_SUFFIX` - State key suffix (default: `_state`)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            state_suffix: env::var("CACHE_STATE_SUFFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.state_suffix),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            state_suffix: DEFAULT_STATE_SUFFIX.to_string(),
            cleanup_interval: 1,
        }
    }
}
