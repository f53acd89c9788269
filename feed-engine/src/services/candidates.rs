//! Candidate pool fetching
//!
//! Retrieves two pools concurrently: content from followed authors and
//! discovery content from everyone else. Each pool is over-fetched so the
//! scorer has enough material to rank meaningfully, filtered at the query
//! level, and the merge is deduplicated with the followed pool winning
//! ties.

use crate::config::FetchConfig;
use crate::models::{ContentItem, ContentTypeFilter, EngagementStyle, UserProfile};
use crate::stores::{ContentQuery, ContentStore, StoreError, StoreResult};
use futures::join;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Merged candidate pools for one request.
#[derive(Debug, Default)]
pub struct CandidateSet {
    pub items: Vec<ContentItem>,
    pub followed_count: usize,
    pub discovery_count: usize,
}

pub struct ContentCandidateFetcher {
    content: Arc<dyn ContentStore>,
    config: FetchConfig,
}

impl ContentCandidateFetcher {
    pub fn new(content: Arc<dyn ContentStore>, config: FetchConfig) -> Self {
        Self { content, config }
    }

    /// The followed:discovery split, shifted toward discovery for
    /// conversational or interest-heavy profiles and toward followed for
    /// passive ones. A tunable, not a hard law.
    pub fn followed_ratio(&self, profile: &UserProfile) -> f64 {
        let mut ratio = self.config.followed_ratio;
        if profile.style == EngagementStyle::Conversational || profile.interests.len() >= 5 {
            ratio -= self.config.ratio_shift;
        } else if profile.style == EngagementStyle::Passive {
            ratio += self.config.ratio_shift;
        }
        ratio.clamp(0.0, 1.0)
    }

    pub async fn fetch(
        &self,
        profile: &UserProfile,
        exclude: &HashSet<Uuid>,
        limit: u32,
        content_type: ContentTypeFilter,
        require_media: bool,
    ) -> StoreResult<CandidateSet> {
        let exclude_ids: Vec<Uuid> = exclude.iter().copied().collect();
        let follow_list: Vec<Uuid> = profile.followed_authors.iter().copied().collect();

        let overfetch = limit.saturating_mul(self.config.overfetch_multiplier).max(limit);
        let ratio = self.followed_ratio(profile);
        let followed_target = (overfetch as f64 * ratio).round() as u32;
        let discovery_target = overfetch.saturating_sub(followed_target).max(1);

        let followed_query = ContentQuery {
            author_ids: Some(follow_list.clone()),
            exclude_author_ids: None,
            exclude_ids: exclude_ids.clone(),
            content_type,
            require_media,
            limit: followed_target,
        };
        let discovery_query = ContentQuery {
            author_ids: None,
            exclude_author_ids: if follow_list.is_empty() {
                None
            } else {
                Some(follow_list.clone())
            },
            exclude_ids,
            content_type,
            require_media,
            limit: discovery_target,
        };

        // Both pools in flight at once; an empty follow set skips the
        // followed query entirely.
        let (followed_res, discovery_res) = if follow_list.is_empty() {
            (Ok(Vec::new()), self.content.find(discovery_query).await)
        } else {
            join!(
                self.content.find(followed_query),
                self.content.find(discovery_query)
            )
        };

        let (followed, discovery) = merge_pool_results(profile.user_id, followed_res, discovery_res)?;

        let followed_count = followed.len();
        let discovery_count = discovery.len();

        // Dedup by id, first occurrence wins: followed pool before discovery.
        let mut picked = HashSet::with_capacity(followed_count + discovery_count);
        let items: Vec<ContentItem> = followed
            .into_iter()
            .chain(discovery)
            .filter(|item| !exclude.contains(&item.id) && picked.insert(item.id))
            .collect();

        debug!(
            user_id = %profile.user_id,
            followed = followed_count,
            discovery = discovery_count,
            merged = items.len(),
            ratio,
            "candidate pools fetched"
        );

        Ok(CandidateSet {
            items,
            followed_count,
            discovery_count,
        })
    }
}

/// One failed pool degrades to empty; both failing means the primary
/// content read is down and the error propagates.
fn merge_pool_results(
    user_id: Uuid,
    followed_res: StoreResult<Vec<ContentItem>>,
    discovery_res: StoreResult<Vec<ContentItem>>,
) -> StoreResult<(Vec<ContentItem>, Vec<ContentItem>)> {
    match (followed_res, discovery_res) {
        (Ok(followed), Ok(discovery)) => Ok((followed, discovery)),
        (Err(e), Ok(discovery)) => {
            warn!(user_id = %user_id, error = %e, "followed pool failed, serving discovery only");
            Ok((Vec::new(), discovery))
        }
        (Ok(followed), Err(e)) => {
            warn!(user_id = %user_id, error = %e, "discovery pool failed, serving followed only");
            Ok((followed, Vec::new()))
        }
        (Err(followed_err), Err(discovery_err)) => {
            warn!(
                user_id = %user_id,
                followed_error = %followed_err,
                discovery_error = %discovery_err,
                "both candidate pools failed"
            );
            Err(StoreError::Unavailable(format!(
                "candidate fetch failed: {discovery_err}"
            )))
        }
    }
}
