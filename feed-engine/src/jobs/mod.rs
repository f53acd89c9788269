//! Background maintenance loops
//!
//! Two long-lived tasks spawned at startup: a fast ticker that flushes the
//! view batcher, and a slow sweeper that runs the cache pressure policy
//! and drops expired entries everywhere. Both run until process exit.

use crate::cache::{EngineCaches, SeenContentTracker};
use crate::config::Config;
use crate::middleware::RateLimitMiddleware;
use crate::services::ViewIncrementBatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Flush accumulated view increments on a fixed interval.
pub fn spawn_view_flusher(batcher: Arc<ViewIncrementBatcher>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms, "view flusher started");

        loop {
            ticker.tick().await;
            match batcher.flush().await {
                Ok(0) => {}
                Ok(flushed) => debug!(flushed, "periodic view flush"),
                // Entries are retained; the next tick retries.
                Err(e) => warn!(error = %e, "periodic view flush failed"),
            }
        }
    });
}

/// Periodic cache maintenance: expiry, memory pressure, idle state.
pub fn spawn_cache_sweeper(
    caches: Arc<EngineCaches>,
    seen: Arc<SeenContentTracker>,
    batcher: Arc<ViewIncrementBatcher>,
    rate_limiter: RateLimitMiddleware,
    config: Arc<Config>,
) {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(config.cache.pressure_check_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = config.cache.pressure_check_secs,
            "cache sweeper started"
        );

        loop {
            ticker.tick().await;

            let expired = caches.purge_expired() + seen.purge_expired();
            let evicted = caches.evict_under_pressure();
            let cooldowns = batcher.purge_cooldown();
            rate_limiter.purge_idle();

            crate::metrics::record_pressure_evictions(evicted);
            crate::metrics::set_cache_entries("profiles", caches.profiles.len());
            crate::metrics::set_cache_entries("engagement", caches.engagement.len());
            crate::metrics::set_cache_entries("view_counts", caches.view_counts.len());

            if expired + evicted + cooldowns > 0 {
                debug!(expired, evicted, cooldowns, "cache sweep completed");
            }
        }
    });
}
