/// Activity Cache Module
///
/// Best-effort read-through cache for reconstructed activity lists.
///
/// Contract:
/// - `get` returns data only if present, parseable and not older than the TTL
/// - every failure (absent, expired, unreadable, corrupt) is a cache miss
/// - `set` and `invalidate` never fail; errors are logged and dropped
/// - keys are lower-cased so lookups are case-insensitive
///
/// Expired entries are not deleted, they are ignored until the next
/// successful reconstruction overwrites them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::metrics;
use crate::store::KeyValueStore;
use crate::types::Activity;

/// Default time-to-live: 5 minutes
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

const KEY_PREFIX: &str = "gmtea_activities_";

pub trait ActivityCache: Send + Sync {
    fn get(&self, address: &str) -> Option<Vec<Activity>>;
    fn set(&self, address: &str, activities: &[Activity]);
    fn invalidate(&self, address: &str);
}

/// Stored value: `{ "data": [...], "timestamp": <ms> }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<Activity>,
    pub timestamp: u64,
}

/// Storage key for an address
pub fn cache_key(address: &str) -> String {
    format!("{}{}", KEY_PREFIX, address.to_lowercase())
}

pub struct LocalActivityCache<S: KeyValueStore> {
    store: S,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> LocalActivityCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raw entry regardless of age, for diagnostics
    pub fn peek(&self, address: &str) -> Option<CacheEntry> {
        let raw = self.store.get_item(&cache_key(address)).ok()??;
        serde_json::from_str(&raw).ok()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age_ms = self.clock.now_ms().saturating_sub(entry.timestamp);
        age_ms as u128 <= self.ttl.as_millis()
    }
}

impl<S: KeyValueStore> ActivityCache for LocalActivityCache<S> {
    fn get(&self, address: &str) -> Option<Vec<Activity>> {
        let key = cache_key(address);

        let raw = match self.store.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                metrics::increment_cache_misses();
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read activity cache");
                metrics::increment_cache_misses();
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unparseable activity cache entry");
                metrics::increment_cache_misses();
                return None;
            }
        };

        if !self.is_fresh(&entry) {
            debug!(key = %key, stored_at = entry.timestamp, "Activity cache entry expired");
            metrics::increment_cache_misses();
            return None;
        }

        metrics::increment_cache_hits();
        Some(entry.data)
    }

    fn set(&self, address: &str, activities: &[Activity]) {
        let key = cache_key(address);
        let entry = CacheEntry {
            data: activities.to_vec(),
            timestamp: self.clock.now_ms(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize activity cache entry");
                metrics::increment_cache_write_errors();
                return;
            }
        };

        if let Err(e) = self.store.set_item(&key, &raw) {
            warn!(key = %key, error = %e, "Failed to write activity cache");
            metrics::increment_cache_write_errors();
        }
    }

    fn invalidate(&self, address: &str) {
        let key = cache_key(address);
        if let Err(e) = self.store.remove_item(&key) {
            warn!(key = %key, error = %e, "Failed to invalidate activity cache");
        }
    }
}

impl<T: ActivityCache + ?Sized> ActivityCache for Arc<T> {
    fn get(&self, address: &str) -> Option<Vec<Activity>> {
        (**self).get(address)
    }

    fn set(&self, address: &str, activities: &[Activity]) {
        (**self).set(address, activities)
    }

    fn invalidate(&self, address: &str) {
        (**self).invalidate(address)
    }
}
