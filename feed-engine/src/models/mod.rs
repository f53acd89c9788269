//! Domain models and feed DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// File extensions treated as video when classifying media attachments.
/// Applied at the query level so non-matching documents are never fetched.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "avi", "mkv"];

/// File extensions treated as static (non-video) media.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// A content document owned by the content store. The engine never mutates
/// it except through the batched view-increment command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub author_id: Uuid,
    /// Denormalized for fast followed/discovery filtering
    pub author_name: String,
    pub author_email: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub view_count: u64,
    #[serde(default)]
    pub viewed_by: HashSet<Uuid>,
}

impl ContentItem {
    pub fn is_video(&self) -> bool {
        self.media_urls.iter().any(|url| has_extension(url, VIDEO_EXTENSIONS))
    }

    pub fn has_media(&self) -> bool {
        !self.media_urls.is_empty()
    }

    pub fn hours_old(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 3600.0
    }
}

fn has_extension(url: &str, extensions: &[&str]) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

/// Per-content engagement counts, recomputed from the store on demand.
/// Counts are never incrementally maintained by the engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub views: u64,
}

impl EngagementSnapshot {
    /// Weighted engagement sum: comments and shares signal far more intent
    /// than raw views.
    pub fn engagement_score(&self, like_w: f64, comment_w: f64, share_w: f64, view_w: f64) -> f64 {
        self.likes as f64 * like_w
            + self.comments as f64 * comment_w
            + self.shares as f64 * share_w
            + self.views as f64 * view_w
    }
}

/// How a user tends to engage, derived from their like/comment balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementStyle {
    /// Comments often relative to likes; leans toward discovery
    Conversational,
    /// Likes heavily, rarely comments
    Passive,
    Casual,
}

impl EngagementStyle {
    pub fn classify(likes: usize, comments: usize) -> Self {
        if likes > 0 && comments as f64 / likes as f64 > 0.5 {
            EngagementStyle::Conversational
        } else if comments == 0 && likes > 3 {
            EngagementStyle::Passive
        } else if comments > 0 && likes as f64 / comments as f64 > 3.0 {
            EngagementStyle::Passive
        } else {
            EngagementStyle::Casual
        }
    }
}

/// Which media kind the user gravitates to, from their interaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaPreference {
    Video,
    Text,
    Mixed,
}

/// Derived, ephemeral personalization profile. Rebuilt from collaborators
/// on cache miss; never persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub followed_authors: HashSet<Uuid>,
    pub recent_liked: Vec<Uuid>,
    pub recent_commented: Vec<Uuid>,
    pub interests: Vec<String>,
    pub profession: Option<String>,
    pub account_age_days: i64,
    pub preferred_media: MediaPreference,
    /// Interaction counts per hour-of-day, soft signal only
    pub active_hours: [u32; 24],
    pub style: EngagementStyle,
}

impl UserProfile {
    /// Minimal profile used when aggregation fails: personalization
    /// degrades to non-personalized discovery instead of failing the feed.
    pub fn neutral(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
            followed_authors: HashSet::new(),
            recent_liked: Vec::new(),
            recent_commented: Vec::new(),
            interests: Vec::new(),
            profession: None,
            account_age_days: 0,
            preferred_media: MediaPreference::Mixed,
            active_hours: [0; 24],
            style: EngagementStyle::Casual,
        }
    }

    pub fn follows(&self, author_id: &Uuid) -> bool {
        self.followed_authors.contains(author_id)
    }

    pub fn has_interacted_with(&self, content_id: &Uuid) -> bool {
        self.recent_liked.contains(content_id) || self.recent_commented.contains(content_id)
    }
}

/// Content type filter for a feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeFilter {
    All,
    Video,
    Text,
}

impl FromStr for ContentTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ContentTypeFilter::All),
            "video" => Ok(ContentTypeFilter::Video),
            "text" => Ok(ContentTypeFilter::Text),
            other => Err(format!("invalid contentType '{other}', expected all|video|text")),
        }
    }
}

/// Requested media quality floor. Validated strictly; acts as a candidate
/// filter hint (`High` restricts to items with media attachments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityFilter {
    Auto,
    Low,
    Medium,
    High,
}

impl FromStr for QualityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(QualityFilter::Auto),
            "low" => Ok(QualityFilter::Low),
            "medium" => Ok(QualityFilter::Medium),
            "high" => Ok(QualityFilter::High),
            other => Err(format!("invalid quality '{other}', expected auto|low|medium|high")),
        }
    }
}

/// A candidate carrying its relevance score through mixing.
#[derive(Debug, Clone)]
pub struct ScoredContent {
    pub item: ContentItem,
    pub score: f64,
    pub is_video: bool,
}

/// One entry of the delivered feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub is_video: bool,
    pub created_at: i64,
    pub ranking_score: f64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub view_count: u64,
}

/// Per-request diagnostics returned alongside the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequestMetrics {
    pub candidates_considered: usize,
    pub followed_candidates: usize,
    pub discovery_candidates: usize,
    pub seen_excluded: usize,
    pub profile_cache_hit: bool,
    pub predictor_used: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub feed: Vec<FeedItem>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub metrics: FeedRequestMetrics,
}
