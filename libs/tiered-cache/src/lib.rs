//! In-process tiered caching layer
//!
//! Provides a hot/warm/cold cache with per-tier TTLs and popularity-based
//! placement:
//! - Hot: short TTL, actively polled keys, never auto-flushed
//! - Warm: medium TTL, default placement for moderately popular keys
//! - Cold: long TTL, first to go under memory pressure
//!
//! A key is resident in at most one tier at a time. Reads probe hot, then
//! warm, then cold; the first unexpired hit wins. The cache is advisory
//! only: callers must always have a recompute path for a miss.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default TTL values (seconds)
pub mod ttl {
    pub const HOT: u64 = 60; // 1 minute
    pub const WARM: u64 = 300; // 5 minutes
    pub const COLD: u64 = 900; // 15 minutes
}

/// Cache tier, ordered by expected access frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

/// Tiered cache configuration
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    pub cold_ttl: Duration,
    /// Entry count above which the cold tier is flushed
    pub soft_entry_limit: usize,
    /// Entry count above which the warm tier is also flushed
    pub hard_entry_limit: usize,
    /// Priority score at or above which entries are placed hot
    pub hot_priority: f64,
    /// Priority score at or above which entries are placed warm
    pub warm_priority: f64,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl: Duration::from_secs(ttl::HOT),
            warm_ttl: Duration::from_secs(ttl::WARM),
            cold_ttl: Duration::from_secs(ttl::COLD),
            soft_entry_limit: 10_000,
            hard_entry_limit: 50_000,
            hot_priority: 0.8,
            warm_priority: 0.4,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Generic hot/warm/cold TTL cache.
///
/// All mutations are internally synchronized; the cache is safe to share
/// across request tasks behind an `Arc`.
pub struct TieredCache<K, V> {
    hot: DashMap<K, CacheEntry<V>>,
    warm: DashMap<K, CacheEntry<V>>,
    cold: DashMap<K, CacheEntry<V>>,
    config: TieredCacheConfig,
}

impl<K, V> TieredCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: TieredCacheConfig) -> Self {
        Self {
            hot: DashMap::new(),
            warm: DashMap::new(),
            cold: DashMap::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TieredCacheConfig::default())
    }

    fn tier_map(&self, tier: Tier) -> &DashMap<K, CacheEntry<V>> {
        match tier {
            Tier::Hot => &self.hot,
            Tier::Warm => &self.warm,
            Tier::Cold => &self.cold,
        }
    }

    fn tier_ttl(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Hot => self.config.hot_ttl,
            Tier::Warm => self.config.warm_ttl,
            Tier::Cold => self.config.cold_ttl,
        }
    }

    /// Insert a value into the given tier with that tier's default TTL.
    ///
    /// The key is removed from every other tier first, so a key can never
    /// be resident in two tiers.
    pub fn insert(&self, key: K, value: V, tier: Tier) {
        for other in [Tier::Hot, Tier::Warm, Tier::Cold] {
            if other != tier {
                self.tier_map(other).remove(&key);
            }
        }
        self.tier_map(tier).insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl: self.tier_ttl(tier),
            },
        );
    }

    /// Insert with tier selected from a priority score.
    ///
    /// Scores at or above `hot_priority` land hot, at or above
    /// `warm_priority` land warm, everything else lands cold.
    pub fn insert_scored(&self, key: K, value: V, priority: f64) {
        self.insert(key, value, self.tier_for_priority(priority));
    }

    pub fn tier_for_priority(&self, priority: f64) -> Tier {
        if priority >= self.config.hot_priority {
            Tier::Hot
        } else if priority >= self.config.warm_priority {
            Tier::Warm
        } else {
            Tier::Cold
        }
    }

    /// Probe hot, then warm, then cold. Expired entries are removed on the
    /// way; the first live hit wins. No promotion happens on read.
    pub fn get(&self, key: &K) -> Option<V> {
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            let map = self.tier_map(tier);
            if let Some(entry) = map.get(key) {
                if entry.is_expired() {
                    drop(entry);
                    map.remove(key);
                    continue;
                }
                return Some(entry.value.clone());
            }
        }
        None
    }

    /// Remove a key from whichever tier holds it.
    pub fn remove(&self, key: &K) -> bool {
        let mut removed = false;
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            removed |= self.tier_map(tier).remove(key).is_some();
        }
        removed
    }

    /// Which tier currently holds the key, ignoring expiry.
    pub fn tier_of(&self, key: &K) -> Option<Tier> {
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            if self.tier_map(tier).contains_key(key) {
                return Some(tier);
            }
        }
        None
    }

    pub fn clear_tier(&self, tier: Tier) -> usize {
        let map = self.tier_map(tier);
        let count = map.len();
        map.clear();
        count
    }

    /// Total resident entries across all tiers, including expired ones not
    /// yet swept. Used as the memory-usage approximation by pressure checks.
    pub fn len(&self) -> usize {
        self.hot.len() + self.warm.len() + self.cold.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tier_len(&self, tier: Tier) -> usize {
        self.tier_map(tier).len()
    }

    /// Flush tiers when resident entries exceed the configured limits:
    /// cold above the soft limit, warm as well above the hard limit. The
    /// hot tier is never auto-flushed.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_under_pressure(&self) -> usize {
        let resident = self.len();
        if resident <= self.config.soft_entry_limit {
            return 0;
        }

        let mut evicted = self.clear_tier(Tier::Cold);
        if self.len() > self.config.hard_entry_limit {
            evicted += self.clear_tier(Tier::Warm);
        }

        debug!(
            resident,
            evicted,
            remaining = self.len(),
            "cache pressure eviction"
        );
        evicted
    }

    /// Drop expired entries from all tiers. Intended for a background
    /// sweeper; reads already expire lazily.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            let map = self.tier_map(tier);
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired());
            purged += before - map.len();
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn short_lived_config() -> TieredCacheConfig {
        TieredCacheConfig {
            hot_ttl: Duration::from_millis(20),
            warm_ttl: Duration::from_millis(40),
            cold_ttl: Duration::from_millis(80),
            soft_entry_limit: 4,
            hard_entry_limit: 8,
            ..TieredCacheConfig::default()
        }
    }

    #[test]
    fn get_probes_hot_first() {
        let cache: TieredCache<&str, u32> = TieredCache::with_defaults();
        cache.insert("a", 1, Tier::Cold);
        cache.insert("b", 2, Tier::Hot);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"missing"), None);
    }

    #[test]
    fn key_resident_in_at_most_one_tier() {
        let cache: TieredCache<&str, u32> = TieredCache::with_defaults();
        cache.insert("k", 1, Tier::Cold);
        cache.insert("k", 2, Tier::Hot);
        cache.insert("k", 3, Tier::Warm);

        assert_eq!(cache.tier_of(&"k"), Some(Tier::Warm));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"k"), Some(3));
    }

    #[test]
    fn priority_selects_tier() {
        let cache: TieredCache<&str, u32> = TieredCache::with_defaults();
        cache.insert_scored("viral", 1, 0.95);
        cache.insert_scored("steady", 2, 0.5);
        cache.insert_scored("fringe", 3, 0.1);

        assert_eq!(cache.tier_of(&"viral"), Some(Tier::Hot));
        assert_eq!(cache.tier_of(&"steady"), Some(Tier::Warm));
        assert_eq!(cache.tier_of(&"fringe"), Some(Tier::Cold));
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache: TieredCache<&str, u32> = TieredCache::new(short_lived_config());
        cache.insert("k", 1, Tier::Hot);
        assert_eq!(cache.get(&"k"), Some(1));

        sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(cache.tier_of(&"k"), None);
    }

    #[test]
    fn pressure_flushes_cold_before_warm_never_hot() {
        let cache: TieredCache<u32, u32> = TieredCache::new(short_lived_config());
        for i in 0..3 {
            cache.insert(i, i, Tier::Hot);
        }
        for i in 10..13 {
            cache.insert(i, i, Tier::Warm);
        }
        for i in 20..23 {
            cache.insert(i, i, Tier::Cold);
        }

        // 9 entries > soft limit (4) but, after dropping cold, 6 entries
        // stay under the hard limit (8): warm survives.
        let evicted = cache.evict_under_pressure();
        assert_eq!(evicted, 3);
        assert_eq!(cache.tier_len(Tier::Cold), 0);
        assert_eq!(cache.tier_len(Tier::Warm), 3);
        assert_eq!(cache.tier_len(Tier::Hot), 3);
    }

    #[test]
    fn pressure_flushes_warm_above_hard_limit() {
        let config = TieredCacheConfig {
            soft_entry_limit: 2,
            hard_entry_limit: 4,
            ..TieredCacheConfig::default()
        };
        let cache: TieredCache<u32, u32> = TieredCache::new(config);
        for i in 0..3 {
            cache.insert(i, i, Tier::Hot);
        }
        for i in 10..16 {
            cache.insert(i, i, Tier::Warm);
        }
        cache.insert(20, 20, Tier::Cold);

        let evicted = cache.evict_under_pressure();
        assert_eq!(evicted, 7);
        assert_eq!(cache.tier_len(Tier::Warm), 0);
        assert_eq!(cache.tier_len(Tier::Hot), 3);
    }

    #[test]
    fn below_soft_limit_nothing_evicted() {
        let cache: TieredCache<u32, u32> = TieredCache::new(short_lived_config());
        cache.insert(1, 1, Tier::Cold);
        assert_eq!(cache.evict_under_pressure(), 0);
        assert_eq!(cache.get(&1), Some(1));
    }

    #[test]
    fn purge_expired_sweeps_all_tiers() {
        let cache: TieredCache<&str, u32> = TieredCache::new(short_lived_config());
        cache.insert("hot", 1, Tier::Hot);
        cache.insert("cold", 2, Tier::Cold);

        sleep(Duration::from_millis(30));
        let purged = cache.purge_expired();
        assert_eq!(purged, 1);
        assert_eq!(cache.get(&"cold"), Some(2));
    }

    #[test]
    fn remove_clears_any_tier() {
        let cache: TieredCache<&str, u32> = TieredCache::with_defaults();
        cache.insert("k", 1, Tier::Warm);
        assert!(cache.remove(&"k"));
        assert!(!cache.remove(&"k"));
        assert_eq!(cache.get(&"k"), None);
    }
}
