//! Session-scoped TTL caching of fetched tables.
//!
//! One explicit cache object per dataset, held in `AppCaches` and passed
//! around by handle; there is no hidden global. Entries expire passively:
//! a lookup after the deadline removes the entry and reports a miss, and
//! the caller refetches. Concurrent misses for the same key may both hit
//! the network; the second insert simply replaces the first.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::entsoe::datasets::AggregatedBidTables;
use crate::entsoe::parse::{BidPoint, CapacityPoint};
use crate::entsoe::tables::{ActivationPriceRow, DayAheadRow};

/// All dataset fetchers share the same one-hour freshness window.
pub const DATASET_TTL: Duration = Duration::from_secs(3600);

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look a key up, dropping the entry if its deadline has passed.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(Arc::clone(&entry.value)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value and hand back the shared handle the cache keeps.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + self.ttl,
            },
        );
        value
    }
}

/// The per-dataset caches, created once at startup.
pub struct AppCaches {
    pub day_ahead: TtlCache<(String, NaiveDate), Vec<DayAheadRow>>,
    pub activation_prices: TtlCache<(String, NaiveDate), Vec<ActivationPriceRow>>,
    pub aggregated_bids: TtlCache<(String, NaiveDate), AggregatedBidTables>,
    pub balancing_bids: TtlCache<(String, NaiveDate), Vec<BidPoint>>,
    pub procured_capacity: TtlCache<(String, NaiveDate), Vec<CapacityPoint>>,
}

impl AppCaches {
    pub fn new() -> Self {
        Self {
            day_ahead: TtlCache::new(DATASET_TTL),
            activation_prices: TtlCache::new(DATASET_TTL),
            aggregated_bids: TtlCache::new(DATASET_TTL),
            balancing_bids: TtlCache::new(DATASET_TTL),
            procured_capacity: TtlCache::new(DATASET_TTL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_inserted_value() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get(&"k").is_none());
        cache.insert("k", 7);
        assert_eq!(*cache.get(&"k").expect("fresh entry"), 7);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::ZERO);
        cache.insert("k", 7);
        assert!(cache.get(&"k").is_none());
        // the expired entry is gone, not just hidden
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(*cache.get(&"k").expect("fresh entry"), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let cache: TtlCache<(String, NaiveDate), u32> = TtlCache::new(Duration::from_secs(60));
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        cache.insert(("CZ".to_string(), date), 1);
        assert!(cache.get(&("DE".to_string(), date)).is_none());
        assert_eq!(*cache.get(&("CZ".to_string(), date)).unwrap(), 1);
    }
}
