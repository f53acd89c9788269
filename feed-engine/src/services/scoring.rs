//! Content relevance scoring
//!
//! Combines recency decay, engagement, relationship and personalization
//! signals under configured weights, optionally blended with an external
//! predictor. The local weighted formula is the sole guaranteed scoring
//! path: every predictor failure or timeout falls back to it
//! deterministically.
//!
//! Scores are monotonically comparable, not hard-bounded: the quality
//! multiplier can push a combined score slightly above 1.

use crate::config::RankingConfig;
use crate::models::{ContentItem, EngagementSnapshot, MediaPreference, ScoredContent, UserProfile};
use crate::services::predictor::{FeatureVector, PredictorClient};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct ScoringEngine {
    config: RankingConfig,
    predictor: Option<Arc<PredictorClient>>,
}

impl ScoringEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            predictor: None,
        }
    }

    pub fn with_predictor(config: RankingConfig, predictor: Arc<PredictorClient>) -> Self {
        Self {
            config,
            predictor: Some(predictor),
        }
    }

    /// Score and order candidates, best first. Ties within jitter range
    /// break by content id descending (newest-first for v4-style ids).
    ///
    /// Returns the ranked list and whether the external predictor
    /// contributed to any score.
    pub async fn rank(
        &self,
        items: Vec<ContentItem>,
        profile: &UserProfile,
        engagement: &HashMap<Uuid, EngagementSnapshot>,
        now: DateTime<Utc>,
    ) -> (Vec<ScoredContent>, bool) {
        let mut predictor_used = false;

        let external_scores: Vec<Option<f64>> = match &self.predictor {
            Some(predictor) => {
                let calls = items.iter().map(|item| {
                    let snapshot = engagement.get(&item.id).copied().unwrap_or_default();
                    let features = self.feature_vector(item, profile, &snapshot, now);
                    let predictor = Arc::clone(predictor);
                    async move { predictor.predict(&features).await }
                });
                join_all(calls)
                    .await
                    .into_iter()
                    .map(|result| match result {
                        Ok(score) => Some(score),
                        Err(e) => {
                            debug!(error = %e, "predictor unavailable, using local formula");
                            crate::metrics::record_predictor_fallback();
                            None
                        }
                    })
                    .collect()
            }
            None => vec![None; items.len()],
        };

        let mut rng = rand::thread_rng();
        let mut scored: Vec<ScoredContent> = items
            .into_iter()
            .zip(external_scores)
            .map(|(item, external)| {
                let snapshot = engagement.get(&item.id).copied().unwrap_or_default();
                let base = match external {
                    Some(ext) => {
                        predictor_used = true;
                        ext
                    }
                    None => self.local_score(&item, profile, &snapshot, now),
                };

                let mut score =
                    base * self.quality_multiplier(&item) * self.viewed_penalty(&item, profile);

                if self.config.jitter_fraction > 0.0 {
                    let jitter = rng
                        .gen_range(-self.config.jitter_fraction..=self.config.jitter_fraction);
                    score *= 1.0 + jitter;
                }

                let is_video = item.is_video();
                ScoredContent {
                    item,
                    score: score.max(0.0),
                    is_video,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.item.id.cmp(&a.item.id))
        });

        (scored, predictor_used)
    }

    /// The deterministic local formula: weighted sum of four components,
    /// each in [0, 1].
    pub fn local_score(
        &self,
        item: &ContentItem,
        profile: &UserProfile,
        snapshot: &EngagementSnapshot,
        now: DateTime<Utc>,
    ) -> f64 {
        let c = &self.config;
        c.recency_weight * self.recency_component(item.hours_old(now))
            + c.engagement_weight * self.engagement_component(snapshot)
            + c.relationship_weight * self.relationship_component(item, profile)
            + c.preference_weight * self.preference_component(item, profile)
    }

    /// Smooth, bounded, never zero; favors very recent items without a
    /// hard cliff.
    pub fn recency_component(&self, hours_old: f64) -> f64 {
        1.0 / (1.0 + hours_old.max(self.config.recency_epsilon).sqrt())
    }

    /// Log-normalized weighted engagement sum; saturation keeps viral
    /// outliers from dominating.
    pub fn engagement_component(&self, snapshot: &EngagementSnapshot) -> f64 {
        let c = &self.config;
        let raw = snapshot.engagement_score(
            c.like_weight,
            c.comment_weight,
            c.share_weight,
            c.view_weight,
        );
        ((1.0 + raw).ln() / (1.0 + c.engagement_saturation).ln()).min(1.0)
    }

    fn relationship_component(&self, item: &ContentItem, profile: &UserProfile) -> f64 {
        if profile.follows(&item.author_id) {
            self.config.followed_boost.min(1.0)
        } else if profile.has_interacted_with(&item.id)
            || item.viewed_by.contains(&profile.user_id)
        {
            self.config.affinity_boost.min(1.0)
        } else {
            0.0
        }
    }

    fn preference_component(&self, item: &ContentItem, profile: &UserProfile) -> f64 {
        let haystack = format!(
            "{} {} {}",
            item.title,
            item.description,
            item.category.as_deref().unwrap_or("")
        )
        .to_lowercase();

        let interest_matches = profile
            .interests
            .iter()
            .filter(|interest| haystack.contains(&interest.to_lowercase()))
            .count();
        let mut component = (interest_matches as f64 / 3.0).min(0.5);

        if let Some(profession) = &profile.profession {
            if haystack.contains(&profession.to_lowercase()) {
                component += 0.25;
            }
        }

        component += match (profile.preferred_media, item.is_video()) {
            (MediaPreference::Video, true) | (MediaPreference::Text, false) => 0.25,
            (MediaPreference::Mixed, _) => 0.1,
            _ => 0.0,
        };

        component.min(1.0)
    }

    /// Author/media completeness bonus applied to both scoring paths.
    fn quality_multiplier(&self, item: &ContentItem) -> f64 {
        let mut multiplier = 1.0;
        if item.has_media() {
            multiplier += 0.1;
        }
        if item.description.len() >= 80 {
            multiplier += 0.05;
        }
        multiplier
    }

    fn viewed_penalty(&self, item: &ContentItem, profile: &UserProfile) -> f64 {
        if item.viewed_by.contains(&profile.user_id) {
            self.config.viewed_penalty
        } else {
            1.0
        }
    }

    fn feature_vector(
        &self,
        item: &ContentItem,
        profile: &UserProfile,
        snapshot: &EngagementSnapshot,
        now: DateTime<Utc>,
    ) -> FeatureVector {
        let c = &self.config;
        FeatureVector {
            recency_hours: item.hours_old(now),
            engagement_score: snapshot.engagement_score(
                c.like_weight,
                c.comment_weight,
                c.share_weight,
                c.view_weight,
            ),
            like_count: snapshot.likes,
            comment_count: snapshot.comments,
            share_count: snapshot.shares,
            view_count: snapshot.views,
            author_followed: profile.follows(&item.author_id),
            prior_affinity: profile.has_interacted_with(&item.id),
            interest_match: self.preference_component(item, profile),
            is_video: item.is_video(),
            viewer_account_age_days: profile.account_age_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use std::time::Duration;

    fn deterministic_config() -> RankingConfig {
        RankingConfig {
            jitter_fraction: 0.0,
            ..RankingConfig::default()
        }
    }

    fn test_item(hours_old: i64) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_name: "author".to_string(),
            author_email: "author@example.com".to_string(),
            title: "Learning Rust".to_string(),
            description: "A walkthrough of ownership and borrowing".to_string(),
            category: Some("programming".to_string()),
            media_urls: vec![],
            created_at: Utc::now() - ChronoDuration::hours(hours_old),
            view_count: 0,
            viewed_by: HashSet::new(),
        }
    }

    #[test]
    fn recency_strictly_decreases_with_age() {
        let engine = ScoringEngine::new(deterministic_config());
        let mut previous = f64::INFINITY;
        for hours in [0.0, 1.0, 6.0, 24.0, 72.0, 720.0] {
            let component = engine.recency_component(hours);
            assert!(component < previous, "recency must decrease at {hours}h");
            assert!(component > 0.0, "recency never reaches zero");
            previous = component;
        }
    }

    #[test]
    fn engagement_is_log_normalized_and_capped() {
        let engine = ScoringEngine::new(deterministic_config());
        let modest = EngagementSnapshot {
            likes: 10,
            comments: 5,
            shares: 1,
            views: 100,
        };
        let viral = EngagementSnapshot {
            likes: 1_000_000,
            comments: 500_000,
            shares: 100_000,
            views: 50_000_000,
        };

        let modest_score = engine.engagement_component(&modest);
        let viral_score = engine.engagement_component(&viral);

        assert!(modest_score > 0.0 && modest_score < 1.0);
        assert!(viral_score <= 1.0, "viral outliers must saturate");
        assert!(viral_score > modest_score);
    }

    #[test]
    fn followed_author_outranks_stranger() {
        let engine = ScoringEngine::new(deterministic_config());
        let item = test_item(2);
        let snapshot = EngagementSnapshot::default();

        let mut follower = UserProfile::neutral(Uuid::new_v4());
        follower.followed_authors.insert(item.author_id);
        let stranger = UserProfile::neutral(Uuid::new_v4());

        let followed_score = engine.local_score(&item, &follower, &snapshot, Utc::now());
        let stranger_score = engine.local_score(&item, &stranger, &snapshot, Utc::now());
        assert!(followed_score > stranger_score);
    }

    #[test]
    fn interest_match_raises_score() {
        let engine = ScoringEngine::new(deterministic_config());
        let item = test_item(2);
        let snapshot = EngagementSnapshot::default();

        let mut interested = UserProfile::neutral(Uuid::new_v4());
        interested.interests = vec!["rust".to_string(), "ownership".to_string()];
        let indifferent = UserProfile::neutral(Uuid::new_v4());

        let interested_score = engine.local_score(&item, &interested, &snapshot, Utc::now());
        let indifferent_score = engine.local_score(&item, &indifferent, &snapshot, Utc::now());
        assert!(interested_score > indifferent_score);
    }

    #[tokio::test]
    async fn already_viewed_content_is_penalized() {
        let engine = ScoringEngine::new(deterministic_config());
        let profile = UserProfile::neutral(Uuid::new_v4());

        let fresh = test_item(1);
        let mut watched = test_item(1);
        watched.viewed_by.insert(profile.user_id);

        let engagement = HashMap::new();
        let (ranked, _) = engine
            .rank(vec![watched.clone(), fresh.clone()], &profile, &engagement, Utc::now())
            .await;

        assert_eq!(ranked[0].item.id, fresh.id);
        assert!(ranked[1].score < ranked[0].score * 0.2);
    }

    #[tokio::test]
    async fn rank_sorts_descending_with_id_tiebreak() {
        let engine = ScoringEngine::new(deterministic_config());
        let profile = UserProfile::neutral(Uuid::new_v4());
        let now = Utc::now();

        let mut a = test_item(5);
        let mut b = test_item(5);
        // Identical content except the id: tie broken by id descending.
        a.created_at = now - ChronoDuration::hours(5);
        b.created_at = now - ChronoDuration::hours(5);

        let (ranked, predictor_used) = engine
            .rank(vec![a.clone(), b.clone()], &profile, &HashMap::new(), now)
            .await;

        assert!(!predictor_used);
        assert!(ranked[0].score >= ranked[1].score);
        assert!(ranked[0].item.id >= ranked[1].item.id);
    }

    #[tokio::test]
    async fn predictor_failure_falls_back_to_finite_scores() {
        let predictor = Arc::new(PredictorClient::new(
            "http://192.0.2.1:9/predict".to_string(),
            Duration::from_millis(40),
        ));
        let engine = ScoringEngine::with_predictor(RankingConfig::default(), predictor);
        let profile = UserProfile::neutral(Uuid::new_v4());

        let items: Vec<ContentItem> = (0..5).map(|i| test_item(i * 7)).collect();
        let (ranked, predictor_used) = engine
            .rank(items, &profile, &HashMap::new(), Utc::now())
            .await;

        assert!(!predictor_used);
        assert_eq!(ranked.len(), 5);
        for scored in &ranked {
            assert!(scored.score.is_finite());
            assert!(scored.score >= 0.0);
            assert!(scored.score < 10.0);
        }
    }

    #[test]
    fn jitter_stays_within_configured_bounds() {
        let config = RankingConfig {
            jitter_fraction: 0.12,
            ..RankingConfig::default()
        };
        // The jitter multiplier is 1 ± fraction; verify the band edges.
        assert!(1.0 - config.jitter_fraction > 0.85);
        assert!(1.0 + config.jitter_fraction < 1.15);
    }
}
