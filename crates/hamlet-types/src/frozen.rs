//! Frozen-field map: user-pinned values the ticker must not touch.
//!
//! When a user pins a field (`world.resources.food`, `needs.hunger`, ...)
//! the automatic update path skips it until the freeze expires. Freezes
//! are keyed by dotted field path and carry an absolute real-time expiry;
//! the default window is 10 seconds.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default freeze window in seconds.
pub const DEFAULT_FREEZE_SECS: i64 = 10;

/// Map of dotted field paths to their freeze expiry timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenFields {
    expiries: BTreeMap<String, DateTime<Utc>>,
}

impl FrozenFields {
    /// Create an empty map.
    pub const fn new() -> Self {
        Self {
            expiries: BTreeMap::new(),
        }
    }

    /// Freeze a field for the default window starting now.
    pub fn freeze(&mut self, path: &str) {
        self.freeze_for(path, DEFAULT_FREEZE_SECS);
    }

    /// Freeze a field for an explicit number of seconds starting now.
    pub fn freeze_for(&mut self, path: &str, secs: i64) {
        let expiry = Utc::now()
            .checked_add_signed(Duration::seconds(secs))
            .unwrap_or_else(Utc::now);
        self.expiries.insert(path.to_owned(), expiry);
    }

    /// Freeze a field until an absolute expiry (testing and restore).
    pub fn freeze_until(&mut self, path: &str, expiry: DateTime<Utc>) {
        self.expiries.insert(path.to_owned(), expiry);
    }

    /// Whether automatic updates to a field are currently blocked.
    pub fn is_frozen(&self, path: &str) -> bool {
        self.is_frozen_at(path, Utc::now())
    }

    /// Clock-injected variant of [`is_frozen`](Self::is_frozen).
    pub fn is_frozen_at(&self, path: &str, now: DateTime<Utc>) -> bool {
        self.expiries.get(path).is_some_and(|expiry| now < *expiry)
    }

    /// Drop expired entries. Purely housekeeping; `is_frozen` is already
    /// expiry-aware.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.expiries.retain(|_, expiry| now < *expiry);
    }

    /// Number of live and expired entries still held.
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    /// Whether no entries are held.
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_blocks_until_expiry() {
        let mut frozen = FrozenFields::new();
        let now = Utc::now();
        frozen.freeze_until("resources.food", now + Duration::seconds(10));
        assert!(frozen.is_frozen_at("resources.food", now));
        assert!(frozen.is_frozen_at("resources.food", now + Duration::seconds(9)));
        // At expiry the freeze lifts.
        assert!(!frozen.is_frozen_at("resources.food", now + Duration::seconds(10)));
        assert!(!frozen.is_frozen_at("resources.wood", now));
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let mut frozen = FrozenFields::new();
        let now = Utc::now();
        frozen.freeze_until("a", now + Duration::seconds(1));
        frozen.freeze_until("b", now + Duration::seconds(100));
        frozen.sweep(now + Duration::seconds(50));
        assert_eq!(frozen.len(), 1);
    }
}
