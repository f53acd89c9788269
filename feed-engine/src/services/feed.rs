//! Feed orchestration
//!
//! One request flows profile -> seen-set exclusion -> candidate pools ->
//! engagement aggregation -> scoring -> mixing, then the served page is
//! recorded as seen. Personalization inputs degrade independently; the
//! request only fails when the primary candidate read itself is down.

use crate::cache::{EngineCaches, SeenContentTracker};
use crate::error::{AppError, Result};
use crate::models::{
    ContentTypeFilter, FeedItem, FeedRequestMetrics, FeedResponse, QualityFilter, ScoredContent,
};
use crate::services::candidates::ContentCandidateFetcher;
use crate::services::engagement::EngagementMetricsCollector;
use crate::services::mixer::FeedMixer;
use crate::services::profile::UserProfileAggregator;
use crate::services::scoring::ScoringEngine;
use crate::services::view_batcher::{ViewIncrementBatcher, ViewOutcome};
use crate::stores::ContentStore;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tiered_cache::Tier;
use tracing::{debug, info};
use uuid::Uuid;

/// A validated feed request. Handlers parse and bound the raw query before
/// constructing this.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub user_id: Uuid,
    pub limit: usize,
    /// Last content id of the previous page, already validated
    pub cursor: Option<Uuid>,
    pub content_type: ContentTypeFilter,
    pub quality: QualityFilter,
    /// Clears the seen history before fetching
    pub refresh: bool,
}

pub struct FeedService {
    profiles: UserProfileAggregator,
    engagement: EngagementMetricsCollector,
    candidates: ContentCandidateFetcher,
    scoring: ScoringEngine,
    mixer: FeedMixer,
    seen: Arc<SeenContentTracker>,
    batcher: Arc<ViewIncrementBatcher>,
    caches: Arc<EngineCaches>,
    content: Arc<dyn ContentStore>,
}

impl FeedService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: UserProfileAggregator,
        engagement: EngagementMetricsCollector,
        candidates: ContentCandidateFetcher,
        scoring: ScoringEngine,
        mixer: FeedMixer,
        seen: Arc<SeenContentTracker>,
        batcher: Arc<ViewIncrementBatcher>,
        caches: Arc<EngineCaches>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            profiles,
            engagement,
            candidates,
            scoring,
            mixer,
            seen,
            batcher,
            caches,
            content,
        }
    }

    pub async fn get_feed(&self, request: FeedRequest) -> Result<FeedResponse> {
        let started = Instant::now();

        // Refresh clears history before the exclusion set is read, so the
        // fetch below sees no stale excludes.
        if request.refresh {
            self.seen.clear(&request.user_id);
        }

        let (profile, profile_cache_hit) = self.profiles.profile_for(request.user_id).await;

        let mut exclude: HashSet<Uuid> = self.seen.seen(&request.user_id);
        let seen_excluded = exclude.len();
        if let Some(cursor) = request.cursor {
            exclude.insert(cursor);
        }

        // `high` quality restricts candidates to items carrying media.
        let require_media = request.quality == QualityFilter::High;

        let candidates = self
            .candidates
            .fetch(
                &profile,
                &exclude,
                request.limit as u32,
                request.content_type,
                require_media,
            )
            .await?;

        let candidate_ids: Vec<Uuid> = candidates.items.iter().map(|c| c.id).collect();
        let engagement = self.engagement.metrics_for(&candidate_ids).await;

        let now = Utc::now();
        let (ranked, predictor_used) = self
            .scoring
            .rank(candidates.items, &profile, &engagement, now)
            .await;
        let ranked_len = ranked.len();

        let mixed = self.mixer.mix(ranked, request.limit);
        let has_more = ranked_len > mixed.items.len();

        // Recorded only after the full page is assembled.
        let served_ids: Vec<Uuid> = mixed.items.iter().map(|c| c.item.id).collect();
        self.seen.record_seen(request.user_id, &served_ids);

        let feed: Vec<FeedItem> = mixed
            .items
            .iter()
            .map(|scored| to_feed_item(scored, &engagement))
            .collect();

        let duration_ms = started.elapsed().as_millis() as u64;
        crate::metrics::record_feed_request(duration_ms, feed.len());

        info!(
            user_id = %request.user_id,
            items = feed.len(),
            candidates = ranked_len,
            predictor_used,
            duration_ms,
            "feed assembled"
        );

        Ok(FeedResponse {
            feed,
            has_more,
            next_cursor: mixed.next_cursor.map(|id| {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(id.to_string())
            }),
            metrics: FeedRequestMetrics {
                candidates_considered: ranked_len,
                followed_candidates: candidates.followed_count,
                discovery_candidates: candidates.discovery_count,
                seen_excluded,
                profile_cache_hit,
                predictor_used,
                duration_ms,
            },
        })
    }

    /// Register one view event for an existing content item.
    pub async fn record_view(&self, content_id: Uuid, viewer_id: Uuid) -> Result<ViewOutcome> {
        if self.content.get(content_id).await?.is_none() {
            return Err(AppError::NotFound(format!("content {content_id}")));
        }
        Ok(self.batcher.record_view(content_id, viewer_id).await)
    }

    /// Cache-lagged view count: the stored counter plus any increments
    /// still waiting in the batcher.
    pub async fn view_count(&self, content_id: Uuid) -> Result<u64> {
        let stored = match self.caches.view_counts.get(&content_id) {
            Some(count) => {
                crate::metrics::record_cache_event("view_count", "hit");
                count
            }
            None => {
                crate::metrics::record_cache_event("view_count", "miss");
                let item = self
                    .content
                    .get(content_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("content {content_id}")))?;
                self.caches
                    .view_counts
                    .insert(content_id, item.view_count, Tier::Hot);
                item.view_count
            }
        };

        let pending = self.batcher.pending_increment(&content_id).await;
        debug!(content_id = %content_id, stored, pending, "view count read");
        Ok(stored + pending)
    }
}

fn to_feed_item(
    scored: &ScoredContent,
    engagement: &HashMap<Uuid, crate::models::EngagementSnapshot>,
) -> FeedItem {
    let snapshot = engagement.get(&scored.item.id).copied().unwrap_or_default();
    FeedItem {
        id: scored.item.id.to_string(),
        author_id: scored.item.author_id.to_string(),
        author_name: scored.item.author_name.clone(),
        title: scored.item.title.clone(),
        description: scored.item.description.clone(),
        media_urls: scored.item.media_urls.clone(),
        is_video: scored.is_video,
        created_at: scored.item.created_at.timestamp_millis(),
        ranking_score: scored.score,
        like_count: snapshot.likes,
        comment_count: snapshot.comments,
        share_count: snapshot.shares,
        view_count: scored.item.view_count.max(snapshot.views),
    }
}
