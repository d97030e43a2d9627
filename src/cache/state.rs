//! Cache Entry State Module
//!
//! Metadata record persisted alongside every cached value: declared type,
//! expiration policy and usage bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Expiration Policy ==
/// How long a cached entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at a fixed instant regardless of access
    Absolute(DateTime<Utc>),
    /// Expires after a window of inactivity; every read renews it.
    ///
    /// The window is stored in whole milliseconds; any sub-millisecond part
    /// is dropped.
    Sliding(Duration),
}

impl Expiration {
    /// Absolute expiration at `at`.
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Expiration::Absolute(at)
    }

    /// Absolute expiration `ttl` from now.
    pub fn absolute_in(ttl: Duration) -> Self {
        let at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Expiration::Absolute(at)
    }

    /// Sliding expiration with the given window.
    ///
    /// The window must be at least one millisecond. It is truncated to
    /// whole milliseconds when the entry state is built.
    pub fn sliding(window: Duration) -> Result<Self> {
        window_ms(window)?;
        Ok(Expiration::Sliding(window))
    }
}

fn window_ms(window: Duration) -> Result<u64> {
    let ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 {
        return Err(CacheError::InvalidRequest(
            "Sliding window must be at least 1 ms".to_string(),
        ));
    }
    Ok(ms)
}

fn add_ms(at: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    let delta = chrono::Duration::milliseconds(ms);
    at.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// == Cache Entry State ==
/// Metadata record stored under the state key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryState {
    /// Declared type name of the cached value, captured at write time
    pub type_name: String,
    /// Renew-on-access expiration when true
    pub is_sliding: bool,
    /// Instant after which the entry is expired
    pub utc_absolute_expiration: DateTime<Utc>,
    /// Sliding window in milliseconds, present only for sliding entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sliding_window_ms: Option<u64>,
    /// Instant the entry was written
    pub utc_created: DateTime<Utc>,
    /// Instant of the last renewing read
    #[serde(default)]
    pub utc_last_accessed: Option<DateTime<Utc>>,
    /// Number of renewing reads
    #[serde(default)]
    pub access_count: u64,
}

impl CacheEntryState {
    // == Constructor ==
    /// Creates the state for a value of `type_name` written at `now`.
    pub fn new(type_name: impl Into<String>, expiration: Expiration, now: DateTime<Utc>) -> Result<Self> {
        let (is_sliding, utc_absolute_expiration, sliding_window_ms) = match expiration {
            Expiration::Absolute(at) => (false, at, None),
            Expiration::Sliding(window) => {
                let ms = window_ms(window)?;
                (true, add_ms(now, ms), Some(ms))
            }
        };

        Ok(Self {
            type_name: type_name.into(),
            is_sliding,
            utc_absolute_expiration,
            sliding_window_ms,
            utc_created: now,
            utc_last_accessed: None,
            access_count: 0,
        })
    }

    // == Compute TTL ==
    /// Remaining lifetime at `now`.
    ///
    /// Returns `None` when the entry is already expired; a non-positive TTL is
    /// never handed to the backing store.
    pub fn compute_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self.utc_absolute_expiration.signed_duration_since(now);
        if remaining <= chrono::Duration::zero() {
            return None;
        }
        remaining.to_std().ok()
    }

    // == Renew On Access ==
    /// Pushes the expiration of a sliding entry to `now + window` and records
    /// the access.
    ///
    /// No-op on absolute entries; returns whether the state changed.
    pub fn renew_on_access(&mut self, now: DateTime<Utc>) -> bool {
        let window = match (self.is_sliding, self.sliding_window_ms) {
            (true, Some(ms)) => ms,
            _ => return false,
        };

        self.utc_absolute_expiration = add_ms(now, window);
        self.utc_last_accessed = Some(now);
        self.access_count += 1;
        true
    }

    /// Sliding window, if any.
    pub fn sliding_window(&self) -> Option<Duration> {
        self.sliding_window_ms.map(Duration::from_millis)
    }
}
