//! Batched view-count write-back
//!
//! Coalesces per-user view events into periodic bulk writes so counter
//! traffic never hammers the content store. Repeat views of the same
//! content by the same viewer inside the cooldown window are no-ops.
//!
//! Delivery is at-least-once: a failed flush keeps its entries for the
//! next cycle. The viewer-set merge is idempotent; the raw counter may
//! occasionally over-count on partial failure, an accepted tradeoff for a
//! non-critical, eventually-consistent metric.

use crate::cache::EngineCaches;
use crate::config::BatcherConfig;
use crate::stores::{ContentStore, StoreResult, ViewUpdate};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of recording one view event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Accumulated; will be flushed in the next cycle
    Counted,
    /// Duplicate within the cooldown window; already counted
    Deduplicated,
}

#[derive(Debug)]
struct ViewBatch {
    viewer_ids: HashSet<Uuid>,
    increment: u64,
    first_recorded: Instant,
}

pub struct ViewIncrementBatcher {
    content: Arc<dyn ContentStore>,
    caches: Arc<EngineCaches>,
    pending: Mutex<HashMap<Uuid, ViewBatch>>,
    /// Short-TTL dedup keyed by (content, viewer)
    cooldown: DashMap<(Uuid, Uuid), Instant>,
    config: BatcherConfig,
}

impl ViewIncrementBatcher {
    pub fn new(
        content: Arc<dyn ContentStore>,
        caches: Arc<EngineCaches>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            content,
            caches,
            pending: Mutex::new(HashMap::new()),
            cooldown: DashMap::new(),
            config,
        }
    }

    fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.config.dedup_cooldown_secs)
    }

    /// Record one view. Idempotent per (content, viewer) within the
    /// cooldown window.
    pub async fn record_view(&self, content_id: Uuid, viewer_id: Uuid) -> ViewOutcome {
        let pair = (content_id, viewer_id);
        if let Some(seen_at) = self.cooldown.get(&pair) {
            if seen_at.elapsed() < self.cooldown_window() {
                return ViewOutcome::Deduplicated;
            }
        }
        self.cooldown.insert(pair, Instant::now());

        let over_threshold = {
            let mut pending = self.pending.lock().await;
            let batch = pending.entry(content_id).or_insert_with(|| ViewBatch {
                viewer_ids: HashSet::new(),
                increment: 0,
                first_recorded: Instant::now(),
            });
            batch.increment += 1;
            batch.viewer_ids.insert(viewer_id);
            enforce_cap(&mut pending, self.config.max_pending_entries);
            pending.len() >= self.config.flush_size_threshold
        };

        if over_threshold {
            // Size threshold reached before the timer; flush eagerly.
            if let Err(e) = self.flush().await {
                warn!(error = %e, "size-triggered flush failed, entries retained");
            }
        }

        ViewOutcome::Counted
    }

    /// Convert accumulated batches into one bulk write. On failure the
    /// entries are merged back and retried on the next cycle.
    pub async fn flush(&self) -> StoreResult<usize> {
        let drained: HashMap<Uuid, ViewBatch> = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };

        if drained.is_empty() {
            return Ok(0);
        }

        let updates: Vec<ViewUpdate> = drained
            .iter()
            .map(|(content_id, batch)| ViewUpdate {
                content_id: *content_id,
                increment: batch.increment,
                add_viewers: batch.viewer_ids.iter().copied().collect(),
            })
            .collect();
        let count = updates.len();

        match self.content.bulk_update_views(updates).await {
            Ok(()) => {
                // Cached counts are stale the moment the store absorbs the
                // increments; drop them so the next read refetches instead
                // of reporting a pre-flush counter with empty pending.
                for content_id in drained.keys() {
                    self.caches.view_counts.remove(content_id);
                }
                debug!(batches = count, "view batch flushed");
                crate::metrics::record_view_flush("success", count);
                Ok(count)
            }
            Err(e) => {
                // Merge back anything that accrued while the write was in
                // flight, then cap growth by dropping the oldest entries.
                let mut pending = self.pending.lock().await;
                for (content_id, batch) in drained {
                    match pending.remove(&content_id) {
                        Some(newer) => {
                            let mut merged = batch;
                            merged.increment += newer.increment;
                            merged.viewer_ids.extend(newer.viewer_ids);
                            pending.insert(content_id, merged);
                        }
                        None => {
                            pending.insert(content_id, batch);
                        }
                    }
                }
                enforce_cap(&mut pending, self.config.max_pending_entries);
                warn!(error = %e, retained = pending.len(), "view flush failed, retrying next cycle");
                crate::metrics::record_view_flush("error", count);
                Err(e)
            }
        }
    }

    /// Unflushed increment for one content id, for cache-lagged reads.
    pub async fn pending_increment(&self, content_id: &Uuid) -> u64 {
        self.pending
            .lock()
            .await
            .get(content_id)
            .map(|b| b.increment)
            .unwrap_or(0)
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drop expired cooldown pairs. Called by the background sweeper.
    pub fn purge_cooldown(&self) -> usize {
        let window = self.cooldown_window();
        let before = self.cooldown.len();
        self.cooldown.retain(|_, seen_at| seen_at.elapsed() < window);
        before - self.cooldown.len()
    }
}

/// Drop the oldest batches past the ceiling so a sustained store outage
/// cannot grow the map without bound.
fn enforce_cap(pending: &mut HashMap<Uuid, ViewBatch>, max_entries: usize) {
    while pending.len() > max_entries {
        let oldest = pending
            .iter()
            .min_by_key(|(_, batch)| batch.first_recorded)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                pending.remove(&id);
            }
            None => break,
        }
    }
}
