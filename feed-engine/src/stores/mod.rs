//! Collaborator store contracts
//!
//! Persistent storage of content, users, likes and comments lives outside
//! the engine. These traits are the typed query/command seam the engine
//! consumes; production wiring binds them to the real stores, tests bind
//! them to in-memory implementations or mocks.

pub mod memory;

use crate::models::{ContentItem, ContentTypeFilter, EngagementSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query timed out: {0}")]
    Timeout(String),
}

/// Typed candidate query. Filters are applied at the query level so
/// non-matching documents are never fetched.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    /// Restrict to these authors (followed pool) when set
    pub author_ids: Option<Vec<Uuid>>,
    /// Exclude these authors (discovery pool) when set
    pub exclude_author_ids: Option<Vec<Uuid>>,
    /// Content ids to exclude: seen set, explicit excludes, cursor bound
    pub exclude_ids: Vec<Uuid>,
    pub content_type: ContentTypeFilter,
    /// Only items carrying media attachments (quality floor)
    pub require_media: bool,
    pub limit: u32,
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self {
            author_ids: None,
            exclude_author_ids: None,
            exclude_ids: Vec::new(),
            content_type: ContentTypeFilter::All,
            require_media: false,
            limit: 50,
        }
    }
}

/// One entry of the batched view write-back.
#[derive(Debug, Clone)]
pub struct ViewUpdate {
    pub content_id: Uuid,
    pub increment: u64,
    pub add_viewers: Vec<Uuid>,
}

/// A single like/comment event from the user's recent history.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub content_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub content_is_video: bool,
}

/// The stored user record consumed by profile aggregation.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub interests: Vec<String>,
    pub profession: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Typed candidate query; never scans the whole corpus.
    async fn find(&self, query: ContentQuery) -> StoreResult<Vec<ContentItem>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<ContentItem>>;

    /// One bulk write per flush: increment counters, merge viewer sets.
    /// The viewer-set merge is idempotent; the counter is not, which is
    /// why the batcher deduplicates before calling this.
    async fn bulk_update_views(&self, updates: Vec<ViewUpdate>) -> StoreResult<()>;

    /// Aggregate like/comment/share/view counts for exactly this id set.
    async fn engagement_counts(
        &self,
        ids: Vec<Uuid>,
    ) -> StoreResult<HashMap<Uuid, EngagementSnapshot>>;

    async fn recent_likes_by(&self, user_id: Uuid, limit: u32) -> StoreResult<Vec<Interaction>>;

    async fn recent_comments_by(&self, user_id: Uuid, limit: u32)
        -> StoreResult<Vec<Interaction>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SocialGraphStore: Send + Sync {
    async fn following_of(&self, user_id: Uuid, limit: u32) -> StoreResult<Vec<Uuid>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>>;
}
