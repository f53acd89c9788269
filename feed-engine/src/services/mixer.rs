//! Video / non-video feed mixing
//!
//! Interleaves the two scored streams under hard run-length constraints
//! and a soft interleave ratio. Within each stream, the top fraction stays
//! strictly in score order and the tail is shuffled, trading relevance for
//! diversity at the long end. The run caps only relax when the opposite
//! stream is exhausted.

use crate::config::MixerConfig;
use crate::models::ScoredContent;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::debug;
use uuid::Uuid;

/// One mixed, ordered page plus its continuation cursor.
#[derive(Debug)]
pub struct MixedFeed {
    pub items: Vec<ScoredContent>,
    /// Id of the last returned item; the next request excludes up to it
    pub next_cursor: Option<Uuid>,
}

pub struct FeedMixer {
    config: MixerConfig,
}

impl FeedMixer {
    pub fn new(config: MixerConfig) -> Self {
        Self { config }
    }

    pub fn mix(&self, scored: Vec<ScoredContent>, limit: usize) -> MixedFeed {
        let (videos, posts): (Vec<ScoredContent>, Vec<ScoredContent>) =
            scored.into_iter().partition(|c| c.is_video);

        let mut videos = self.order_stream(videos);
        let mut posts = self.order_stream(posts);

        let mut items = Vec::with_capacity(limit);
        let mut video_run = 0usize;
        let mut post_run = 0usize;
        let mut posts_since_video = 0usize;

        while items.len() < limit && (!videos.is_empty() || !posts.is_empty()) {
            let take_video = if posts.is_empty() {
                // Exhausted stream: the other fills remaining slots and the
                // ratio rule relaxes.
                true
            } else if videos.is_empty() {
                false
            } else if video_run >= self.config.max_consecutive_videos {
                false
            } else if post_run >= self.config.max_consecutive_posts {
                true
            } else {
                posts_since_video >= self.config.posts_per_video
            };

            if take_video {
                if let Some(video) = videos.pop_front() {
                    items.push(video);
                    video_run += 1;
                    post_run = 0;
                    posts_since_video = 0;
                }
            } else if let Some(post) = posts.pop_front() {
                items.push(post);
                post_run += 1;
                video_run = 0;
                posts_since_video += 1;
            }
        }

        let next_cursor = items.last().map(|c| c.item.id);
        debug!(
            returned = items.len(),
            videos_left = videos.len(),
            posts_left = posts.len(),
            "feed mixed"
        );

        MixedFeed { items, next_cursor }
    }

    /// Sort a stream by score descending (id descending on ties), keep the
    /// strict head, shuffle the tail.
    fn order_stream(&self, mut stream: Vec<ScoredContent>) -> VecDeque<ScoredContent> {
        stream.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.item.id.cmp(&a.item.id))
        });

        let strict = ((stream.len() as f64) * self.config.strict_head_fraction).ceil() as usize;
        if strict < stream.len() {
            stream[strict..].shuffle(&mut rand::thread_rng());
        }
        stream.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;
    use chrono::Utc;
    use std::collections::HashSet;

    fn scored(score: f64, is_video: bool) -> ScoredContent {
        let media = if is_video {
            vec!["https://cdn/x/clip.mp4".to_string()]
        } else {
            vec![]
        };
        ScoredContent {
            item: ContentItem {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                author_name: "a".to_string(),
                author_email: "a@example.com".to_string(),
                title: "t".to_string(),
                description: "d".to_string(),
                category: None,
                media_urls: media,
                created_at: Utc::now(),
                view_count: 0,
                viewed_by: HashSet::new(),
            },
            score,
            is_video,
        }
    }

    fn assert_run_constraints(items: &[ScoredContent], max_videos: usize, max_posts: usize) {
        let mut run = 0usize;
        let mut last_video = None;
        for item in items {
            if Some(item.is_video) == last_video {
                run += 1;
            } else {
                run = 1;
                last_video = Some(item.is_video);
            }
            let cap = if item.is_video { max_videos } else { max_posts };
            assert!(run <= cap, "run of {run} exceeds cap {cap}");
        }
    }

    #[test]
    fn run_constraints_hold_with_both_streams() {
        let mixer = FeedMixer::new(MixerConfig::default());
        let mut pool: Vec<ScoredContent> = Vec::new();
        for i in 0..10 {
            pool.push(scored(1.0 - i as f64 * 0.01, true));
        }
        for i in 0..20 {
            pool.push(scored(0.9 - i as f64 * 0.01, false));
        }

        let mixed = mixer.mix(pool, 24);
        assert_eq!(mixed.items.len(), 24);
        assert_run_constraints(&mixed.items, 2, 4);
    }

    #[test]
    fn exhausted_posts_relaxes_video_cap() {
        let mixer = FeedMixer::new(MixerConfig::default());
        let videos: Vec<ScoredContent> = (0..6).map(|i| scored(1.0 - i as f64 * 0.1, true)).collect();

        let mixed = mixer.mix(videos, 6);
        // No non-video items exist to interleave: all six videos return.
        assert_eq!(mixed.items.len(), 6);
        assert!(mixed.items.iter().all(|c| c.is_video));
    }

    #[test]
    fn exhausted_videos_fills_with_posts() {
        let mixer = FeedMixer::new(MixerConfig::default());
        let mut pool: Vec<ScoredContent> = (0..2).map(|_| scored(1.0, true)).collect();
        pool.extend((0..12).map(|i| scored(0.9 - i as f64 * 0.01, false)));

        let mixed = mixer.mix(pool, 14);
        assert_eq!(mixed.items.len(), 14);
        // Once the two videos are gone, posts run unconstrained.
        let trailing_posts = mixed
            .items
            .iter()
            .rev()
            .take_while(|c| !c.is_video)
            .count();
        assert!(trailing_posts >= 5);
    }

    #[test]
    fn strict_head_preserves_score_order() {
        let config = MixerConfig {
            strict_head_fraction: 1.0,
            ..MixerConfig::default()
        };
        let mixer = FeedMixer::new(config);
        let posts: Vec<ScoredContent> = (0..8).map(|i| scored(1.0 - i as f64 * 0.1, false)).collect();
        let expected: Vec<Uuid> = {
            let mut sorted = posts.clone();
            sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            sorted.iter().map(|c| c.item.id).collect()
        };

        let mixed = mixer.mix(posts, 8);
        let got: Vec<Uuid> = mixed.items.iter().map(|c| c.item.id).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn cursor_is_last_returned_id() {
        let mixer = FeedMixer::new(MixerConfig::default());
        let pool: Vec<ScoredContent> = (0..5).map(|i| scored(1.0 - i as f64 * 0.1, false)).collect();

        let mixed = mixer.mix(pool, 3);
        assert_eq!(mixed.items.len(), 3);
        assert_eq!(mixed.next_cursor, Some(mixed.items[2].item.id));
    }

    #[test]
    fn empty_input_yields_empty_page() {
        let mixer = FeedMixer::new(MixerConfig::default());
        let mixed = mixer.mix(Vec::new(), 10);
        assert!(mixed.items.is_empty());
        assert!(mixed.next_cursor.is_none());
    }
}
