//! In-memory store implementations
//!
//! Reference bindings for the store traits, used by the standalone binary
//! and integration tests. Query semantics mirror what a real content store
//! would do at the index level: filter first, sort newest-first, then
//! apply the limit.

use crate::models::{ContentItem, ContentTypeFilter, EngagementSnapshot};
use crate::stores::{
    ContentQuery, ContentStore, Interaction, SocialGraphStore, StoreResult, UserRecord, UserStore,
    ViewUpdate,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryContentStore {
    items: DashMap<Uuid, ContentItem>,
    engagement: DashMap<Uuid, EngagementSnapshot>,
    likes: DashMap<Uuid, Vec<Interaction>>,
    comments: DashMap<Uuid, Vec<Interaction>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_content(&self, item: ContentItem) {
        self.items.insert(item.id, item);
    }

    pub fn set_engagement(&self, content_id: Uuid, snapshot: EngagementSnapshot) {
        self.engagement.insert(content_id, snapshot);
    }

    pub fn add_like(&self, user_id: Uuid, interaction: Interaction) {
        self.likes.entry(user_id).or_default().push(interaction);
    }

    pub fn add_comment(&self, user_id: Uuid, interaction: Interaction) {
        self.comments.entry(user_id).or_default().push(interaction);
    }

    pub fn stored_view_count(&self, content_id: &Uuid) -> Option<u64> {
        self.items.get(content_id).map(|item| item.view_count)
    }

    fn matches(query: &ContentQuery, item: &ContentItem) -> bool {
        if query.exclude_ids.contains(&item.id) {
            return false;
        }
        if let Some(authors) = &query.author_ids {
            if !authors.contains(&item.author_id) {
                return false;
            }
        }
        if let Some(excluded) = &query.exclude_author_ids {
            if excluded.contains(&item.author_id) {
                return false;
            }
        }
        if query.require_media && !item.has_media() {
            return false;
        }
        match query.content_type {
            ContentTypeFilter::All => true,
            ContentTypeFilter::Video => item.is_video(),
            ContentTypeFilter::Text => !item.is_video(),
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn find(&self, query: ContentQuery) -> StoreResult<Vec<ContentItem>> {
        let mut matched: Vec<ContentItem> = self
            .items
            .iter()
            .filter(|entry| Self::matches(&query, entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(query.limit as usize);
        Ok(matched)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ContentItem>> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }

    async fn bulk_update_views(&self, updates: Vec<ViewUpdate>) -> StoreResult<()> {
        for update in updates {
            if let Some(mut item) = self.items.get_mut(&update.content_id) {
                item.view_count += update.increment;
                item.viewed_by.extend(update.add_viewers);
            }
        }
        Ok(())
    }

    async fn engagement_counts(
        &self,
        ids: Vec<Uuid>,
    ) -> StoreResult<HashMap<Uuid, EngagementSnapshot>> {
        Ok(ids
            .into_iter()
            .filter_map(|id| self.engagement.get(&id).map(|s| (id, *s.value())))
            .collect())
    }

    async fn recent_likes_by(&self, user_id: Uuid, limit: u32) -> StoreResult<Vec<Interaction>> {
        Ok(recent(&self.likes, user_id, limit))
    }

    async fn recent_comments_by(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<Interaction>> {
        Ok(recent(&self.comments, user_id, limit))
    }
}

fn recent(map: &DashMap<Uuid, Vec<Interaction>>, user_id: Uuid, limit: u32) -> Vec<Interaction> {
    let mut interactions = map
        .get(&user_id)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();
    interactions.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    interactions.truncate(limit as usize);
    interactions
}

#[derive(Default)]
pub struct InMemorySocialGraphStore {
    edges: DashMap<Uuid, Vec<Uuid>>,
}

impl InMemorySocialGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&self, follower: Uuid, followee: Uuid) {
        self.edges.entry(follower).or_default().push(followee);
    }
}

#[async_trait]
impl SocialGraphStore for InMemorySocialGraphStore {
    async fn following_of(&self, user_id: Uuid, limit: u32) -> StoreResult<Vec<Uuid>> {
        let mut followees = self
            .edges
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        followees.truncate(limit as usize);
        Ok(followees)
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<Uuid, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.get(&user_id).map(|entry| entry.value().clone()))
    }
}
