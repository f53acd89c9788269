//! Engagement metric aggregation
//!
//! Issues one bulk aggregate query for exactly the requested id set and
//! caches the result under a key derived from the sorted ids. Counts drift
//! quickly, so the TTL is short. Missing ids get a zero snapshot; a store
//! failure degrades every id to zero rather than failing the request.

use crate::cache::EngineCaches;
use crate::models::EngagementSnapshot;
use crate::stores::ContentStore;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct EngagementMetricsCollector {
    content: Arc<dyn ContentStore>,
    caches: Arc<EngineCaches>,
}

impl EngagementMetricsCollector {
    pub fn new(content: Arc<dyn ContentStore>, caches: Arc<EngineCaches>) -> Self {
        Self { content, caches }
    }

    pub async fn metrics_for(&self, ids: &[Uuid]) -> HashMap<Uuid, EngagementSnapshot> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let key = id_set_key(ids);
        if let Some(cached) = self.caches.engagement.get(&key) {
            crate::metrics::record_cache_event("engagement", "hit");
            return cached;
        }
        crate::metrics::record_cache_event("engagement", "miss");

        let mut snapshots = match self.content.engagement_counts(ids.to_vec()).await {
            Ok(counts) => counts,
            Err(e) => {
                // Degraded zeros are never cached: the next request misses
                // and re-queries the store once it has recovered.
                warn!(error = %e, ids = ids.len(), "engagement aggregation failed, using zeros");
                return zero_snapshots(ids);
            }
        };

        // Missing ids default to zero rather than erroring.
        for id in ids {
            snapshots.entry(*id).or_default();
        }

        debug!(ids = ids.len(), "engagement snapshots aggregated");
        self.caches
            .engagement
            .insert(key, snapshots.clone(), tiered_cache::Tier::Warm);
        snapshots
    }
}

fn zero_snapshots(ids: &[Uuid]) -> HashMap<Uuid, EngagementSnapshot> {
    ids.iter().map(|id| (*id, EngagementSnapshot::default())).collect()
}

/// Cache key over the sorted id set: the same ids in any order hit the
/// same entry.
fn id_set_key(ids: &[Uuid]) -> u64 {
    let mut sorted: Vec<&Uuid> = ids.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut hasher = DefaultHasher::new();
    for id in sorted {
        id.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::stores::MockContentStore;

    fn caches() -> Arc<EngineCaches> {
        Arc::new(EngineCaches::new(&CacheConfig::default()))
    }

    #[test]
    fn key_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(id_set_key(&[a, b]), id_set_key(&[b, a]));
        assert_eq!(id_set_key(&[a, a, b]), id_set_key(&[b, a]));
        assert_ne!(id_set_key(&[a]), id_set_key(&[b]));
    }

    #[tokio::test]
    async fn missing_ids_default_to_zero_snapshot() {
        let present = Uuid::new_v4();
        let missing = Uuid::new_v4();

        let mut store = MockContentStore::new();
        store.expect_engagement_counts().returning(move |_| {
            let mut counts = HashMap::new();
            counts.insert(
                present,
                EngagementSnapshot {
                    likes: 5,
                    comments: 1,
                    shares: 0,
                    views: 40,
                },
            );
            Ok(counts)
        });

        let collector = EngagementMetricsCollector::new(Arc::new(store), caches());
        let snapshots = collector.metrics_for(&[present, missing]).await;

        assert_eq!(snapshots[&present].likes, 5);
        assert_eq!(snapshots[&missing].likes, 0);
        assert_eq!(snapshots.len(), 2);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_zeros() {
        let id = Uuid::new_v4();
        let mut store = MockContentStore::new();
        store
            .expect_engagement_counts()
            .returning(|_| Err(crate::stores::StoreError::Unavailable("down".into())));

        let collector = EngagementMetricsCollector::new(Arc::new(store), caches());
        let snapshots = collector.metrics_for(&[id]).await;
        assert_eq!(snapshots[&id].views, 0);
    }

    #[tokio::test]
    async fn recovered_store_is_requeried_after_failure() {
        let id = Uuid::new_v4();
        let mut store = MockContentStore::new();
        let mut attempt = 0u32;
        store.expect_engagement_counts().returning(move |ids| {
            attempt += 1;
            if attempt == 1 {
                return Err(crate::stores::StoreError::Unavailable("down".into()));
            }
            let mut counts = HashMap::new();
            counts.insert(
                ids[0],
                EngagementSnapshot {
                    likes: 42,
                    comments: 0,
                    shares: 0,
                    views: 0,
                },
            );
            Ok(counts)
        });

        let collector = EngagementMetricsCollector::new(Arc::new(store), caches());

        // First call degrades to zeros, but the zeros must not be cached.
        let degraded = collector.metrics_for(&[id]).await;
        assert_eq!(degraded[&id].likes, 0);

        let recovered = collector.metrics_for(&[id]).await;
        assert_eq!(recovered[&id].likes, 42);
    }

    #[tokio::test]
    async fn second_call_hits_cache() {
        let id = Uuid::new_v4();
        let mut store = MockContentStore::new();
        store
            .expect_engagement_counts()
            .times(1)
            .returning(|_| Ok(HashMap::new()));

        let collector = EngagementMetricsCollector::new(Arc::new(store), caches());
        collector.metrics_for(&[id]).await;
        // Second call must be served from cache: the mock allows one call.
        let snapshots = collector.metrics_for(&[id]).await;
        assert_eq!(snapshots.len(), 1);
    }
}
