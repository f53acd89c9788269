pub mod seen;

pub use seen::SeenContentTracker;

use crate::config::CacheConfig;
use crate::models::{EngagementSnapshot, UserProfile};
use std::collections::HashMap;
use std::time::Duration;
use tiered_cache::{TieredCache, TieredCacheConfig};
use uuid::Uuid;

/// The engine's in-process caches, constructed once per process and
/// injected into the services. Every cache is a pure accelerator: a miss
/// always has a recompute path against the collaborator stores.
pub struct EngineCaches {
    /// Personalization profiles, warm-tier TTL around 5-10 minutes
    pub profiles: TieredCache<Uuid, UserProfile>,
    /// Engagement snapshots keyed by a hash of the sorted id set
    pub engagement: TieredCache<u64, HashMap<Uuid, EngagementSnapshot>>,
    /// Cache-lagged view counts for the read endpoint
    pub view_counts: TieredCache<Uuid, u64>,
}

impl EngineCaches {
    pub fn new(config: &CacheConfig) -> Self {
        let base = TieredCacheConfig {
            hot_ttl: Duration::from_secs(config.hot_ttl_secs),
            warm_ttl: Duration::from_secs(config.warm_ttl_secs),
            cold_ttl: Duration::from_secs(config.cold_ttl_secs),
            soft_entry_limit: config.soft_entry_limit,
            hard_entry_limit: config.hard_entry_limit,
            ..TieredCacheConfig::default()
        };

        let profiles = TieredCache::new(TieredCacheConfig {
            warm_ttl: Duration::from_secs(config.profile_ttl_secs),
            ..base.clone()
        });
        let engagement = TieredCache::new(TieredCacheConfig {
            warm_ttl: Duration::from_secs(config.engagement_ttl_secs),
            ..base.clone()
        });
        let view_counts = TieredCache::new(base);

        Self {
            profiles,
            engagement,
            view_counts,
        }
    }

    pub fn total_entries(&self) -> usize {
        self.profiles.len() + self.engagement.len() + self.view_counts.len()
    }

    /// Run the memory-pressure policy over every cache.
    pub fn evict_under_pressure(&self) -> usize {
        self.profiles.evict_under_pressure()
            + self.engagement.evict_under_pressure()
            + self.view_counts.evict_under_pressure()
    }

    pub fn purge_expired(&self) -> usize {
        self.profiles.purge_expired()
            + self.engagement.purge_expired()
            + self.view_counts.purge_expired()
    }
}
