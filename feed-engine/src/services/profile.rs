//! User profile aggregation for personalization
//!
//! Builds the ephemeral `UserProfile` from the collaborator stores: the
//! user record, follow edges, and recent like/comment history, all fetched
//! in parallel with bounded windows. Any collaborator failure degrades to
//! neutral defaults for that component; the feed never fails because
//! personalization data was unavailable.

use crate::cache::EngineCaches;
use crate::config::FetchConfig;
use crate::models::{EngagementStyle, MediaPreference, UserProfile};
use crate::stores::{ContentStore, Interaction, SocialGraphStore, UserStore};
use chrono::{Timelike, Utc};
use futures::join;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct UserProfileAggregator {
    users: Arc<dyn UserStore>,
    graph: Arc<dyn SocialGraphStore>,
    content: Arc<dyn ContentStore>,
    caches: Arc<EngineCaches>,
    config: FetchConfig,
}

impl UserProfileAggregator {
    pub fn new(
        users: Arc<dyn UserStore>,
        graph: Arc<dyn SocialGraphStore>,
        content: Arc<dyn ContentStore>,
        caches: Arc<EngineCaches>,
        config: FetchConfig,
    ) -> Self {
        Self {
            users,
            graph,
            content,
            caches,
            config,
        }
    }

    /// Returns the profile and whether it came from cache.
    pub async fn profile_for(&self, user_id: Uuid) -> (UserProfile, bool) {
        if let Some(profile) = self.caches.profiles.get(&user_id) {
            crate::metrics::record_cache_event("profile", "hit");
            return (profile, true);
        }
        crate::metrics::record_cache_event("profile", "miss");

        let (profile, failed_components) = self.build_profile(user_id).await;

        // A fully failed build is never cached: the next request misses and
        // rebuilds against the recovered stores. Partial failures keep only
        // the short hot-tier TTL so the missing components refresh quickly.
        match failed_components {
            0 => self
                .caches
                .profiles
                .insert(user_id, profile.clone(), tiered_cache::Tier::Warm),
            n if n < 4 => self
                .caches
                .profiles
                .insert(user_id, profile.clone(), tiered_cache::Tier::Hot),
            _ => {}
        }
        (profile, false)
    }

    async fn build_profile(&self, user_id: Uuid) -> (UserProfile, usize) {
        let (user_res, follows_res, likes_res, comments_res) = join!(
            self.users.get_user(user_id),
            self.graph
                .following_of(user_id, self.config.max_follow_edges as u32),
            self.content
                .recent_likes_by(user_id, self.config.recent_likes_limit),
            self.content
                .recent_comments_by(user_id, self.config.recent_comments_limit),
        );

        // Each component degrades independently; the worst case is the
        // fully neutral profile. Failures are counted so the caller can
        // decide whether the result is worth caching.
        let mut failed = 0usize;
        let user = match user_res {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "user record fetch failed, degrading");
                failed += 1;
                None
            }
        };
        let followed_authors: HashSet<Uuid> = match follows_res {
            Ok(ids) => ids
                .into_iter()
                .take(self.config.max_follow_edges)
                .collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "follow edges fetch failed, degrading");
                failed += 1;
                HashSet::new()
            }
        };
        let likes = match likes_res {
            Ok(likes) => likes,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "recent likes fetch failed, degrading");
                failed += 1;
                Vec::new()
            }
        };
        let comments = match comments_res {
            Ok(comments) => comments,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "recent comments fetch failed, degrading");
                failed += 1;
                Vec::new()
            }
        };

        let mut profile = UserProfile::neutral(user_id);
        profile.followed_authors = followed_authors;
        profile.recent_liked = likes.iter().map(|i| i.content_id).collect();
        profile.recent_commented = comments.iter().map(|i| i.content_id).collect();
        profile.active_hours = derive_active_hours(&likes, &comments);
        profile.preferred_media = derive_media_preference(&likes, &comments);
        profile.style = EngagementStyle::classify(likes.len(), comments.len());

        if let Some(user) = user {
            profile.email = Some(user.email);
            profile.interests = user.interests;
            profile.profession = user.profession;
            profile.account_age_days = (Utc::now() - user.created_at).num_days().max(0);
        }

        debug!(
            user_id = %user_id,
            follows = profile.followed_authors.len(),
            likes = profile.recent_liked.len(),
            comments = profile.recent_commented.len(),
            style = ?profile.style,
            failed_components = failed,
            "profile built"
        );
        (profile, failed)
    }
}

/// Hour-of-day histogram over interaction timestamps. Soft signal only.
fn derive_active_hours(likes: &[Interaction], comments: &[Interaction]) -> [u32; 24] {
    let mut hours = [0u32; 24];
    for interaction in likes.iter().chain(comments.iter()) {
        let hour = interaction.occurred_at.hour() as usize;
        hours[hour] += 1;
    }
    hours
}

fn derive_media_preference(likes: &[Interaction], comments: &[Interaction]) -> MediaPreference {
    let mut video = 0usize;
    let mut text = 0usize;
    for interaction in likes.iter().chain(comments.iter()) {
        if interaction.content_is_video {
            video += 1;
        } else {
            text += 1;
        }
    }
    if video > text * 2 {
        MediaPreference::Video
    } else if text > video * 2 {
        MediaPreference::Text
    } else {
        MediaPreference::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::stores::{
        MockContentStore, MockSocialGraphStore, MockUserStore, StoreError, UserRecord,
    };
    use chrono::{TimeZone, Utc};

    fn aggregator(
        users: MockUserStore,
        graph: MockSocialGraphStore,
        content: MockContentStore,
    ) -> UserProfileAggregator {
        UserProfileAggregator::new(
            Arc::new(users),
            Arc::new(graph),
            Arc::new(content),
            Arc::new(EngineCaches::new(&CacheConfig::default())),
            FetchConfig::default(),
        )
    }

    #[tokio::test]
    async fn fully_failed_build_is_not_cached() {
        let user_id = Uuid::new_v4();

        // Every collaborator down. Both requests must reach the stores;
        // a cached neutral profile would leave the second call unserved.
        let mut users = MockUserStore::new();
        users
            .expect_get_user()
            .times(2)
            .returning(|_| Err(StoreError::Unavailable("down".into())));
        let mut graph = MockSocialGraphStore::new();
        graph
            .expect_following_of()
            .times(2)
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));
        let mut content = MockContentStore::new();
        content
            .expect_recent_likes_by()
            .times(2)
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));
        content
            .expect_recent_comments_by()
            .times(2)
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));

        let aggregator = aggregator(users, graph, content);

        let (first, cached) = aggregator.profile_for(user_id).await;
        assert!(!cached);
        assert!(first.followed_authors.is_empty());

        let (_, cached_again) = aggregator.profile_for(user_id).await;
        assert!(!cached_again);
    }

    #[tokio::test]
    async fn clean_build_is_served_from_cache() {
        let user_id = Uuid::new_v4();

        let mut users = MockUserStore::new();
        users.expect_get_user().times(1).returning(move |id| {
            Ok(Some(UserRecord {
                id,
                email: "u@example.com".to_string(),
                name: "u".to_string(),
                interests: vec!["rust".to_string()],
                profession: None,
                created_at: Utc::now() - chrono::Duration::days(100),
            }))
        });
        let mut graph = MockSocialGraphStore::new();
        graph
            .expect_following_of()
            .times(1)
            .returning(|_, _| Ok(vec![Uuid::new_v4()]));
        let mut content = MockContentStore::new();
        content
            .expect_recent_likes_by()
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        content
            .expect_recent_comments_by()
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let aggregator = aggregator(users, graph, content);

        let (first, cached) = aggregator.profile_for(user_id).await;
        assert!(!cached);
        assert_eq!(first.followed_authors.len(), 1);

        // Mocks allow exactly one call each: this must be a cache hit.
        let (second, cached_again) = aggregator.profile_for(user_id).await;
        assert!(cached_again);
        assert_eq!(second.interests, vec!["rust".to_string()]);
    }

    fn interaction(hour: u32, is_video: bool) -> Interaction {
        Interaction {
            content_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
            content_is_video: is_video,
        }
    }

    #[test]
    fn active_hours_buckets_by_interaction_hour() {
        let likes = vec![interaction(9, false), interaction(9, true)];
        let comments = vec![interaction(21, false)];

        let hours = derive_active_hours(&likes, &comments);
        assert_eq!(hours[9], 2);
        assert_eq!(hours[21], 1);
        assert_eq!(hours.iter().sum::<u32>(), 3);
    }

    #[test]
    fn media_preference_requires_clear_majority() {
        let mostly_video: Vec<Interaction> = (0..5).map(|_| interaction(10, true)).collect();
        let one_text = vec![interaction(11, false)];
        assert_eq!(
            derive_media_preference(&mostly_video, &one_text),
            MediaPreference::Video
        );

        let balanced_likes = vec![interaction(10, true), interaction(10, false)];
        assert_eq!(
            derive_media_preference(&balanced_likes, &[]),
            MediaPreference::Mixed
        );

        assert_eq!(derive_media_preference(&[], &[]), MediaPreference::Mixed);
    }
}
