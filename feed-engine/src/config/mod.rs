//! Feed engine configuration
//!
//! One typed configuration, loaded from the environment at startup and
//! injected into the services. Ranking weights, mixing ratios, TTLs and
//! thresholds are all named fields here, never constants baked into logic.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub ranking: RankingConfig,
    pub fetch: FetchConfig,
    pub mixer: MixerConfig,
    pub cache: CacheConfig,
    pub batcher: BatcherConfig,
    pub predictor: PredictorConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

/// Relevance scoring weights and shape parameters.
///
/// The four component weights should sum to 1; `validate()` enforces this
/// within a small tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub recency_weight: f64,
    pub engagement_weight: f64,
    pub relationship_weight: f64,
    pub preference_weight: f64,
    /// Lower bound on content age (hours) fed into the decay curve
    pub recency_epsilon: f64,
    /// Engagement weighted-sum coefficients
    pub like_weight: f64,
    pub comment_weight: f64,
    pub share_weight: f64,
    pub view_weight: f64,
    /// Engagement score at which log-normalization saturates to 1.0
    pub engagement_saturation: f64,
    /// Flat boost for followed authors, smaller boost for prior affinity
    pub followed_boost: f64,
    pub affinity_boost: f64,
    /// Multiplier applied to content the viewer has already watched
    pub viewed_penalty: f64,
    /// Bounded random jitter fraction (0.12 = ±12%)
    pub jitter_fraction: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            recency_weight: 0.25,
            engagement_weight: 0.30,
            relationship_weight: 0.25,
            preference_weight: 0.20,
            recency_epsilon: 0.01,
            like_weight: 1.0,
            comment_weight: 3.0,
            share_weight: 5.0,
            view_weight: 0.1,
            engagement_saturation: 10_000.0,
            followed_boost: 1.0,
            affinity_boost: 0.5,
            viewed_penalty: 0.1,
            jitter_fraction: 0.12,
        }
    }
}

/// Candidate pool fetching tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Baseline share of the page drawn from followed authors (0.6 = 60:40)
    pub followed_ratio: f64,
    /// Shift applied toward discovery for conversational/high-interest
    /// profiles, toward followed otherwise
    pub ratio_shift: f64,
    /// Per-pool over-fetch multiplier relative to the page size
    pub overfetch_multiplier: u32,
    /// Bound on follow edges considered for the followed pool
    pub max_follow_edges: usize,
    /// Bounded interaction windows for profile aggregation
    pub recent_likes_limit: u32,
    pub recent_comments_limit: u32,
    /// Hard cap on requested page size
    pub max_page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            followed_ratio: 0.6,
            ratio_shift: 0.15,
            overfetch_multiplier: 3,
            max_follow_edges: 200,
            recent_likes_limit: 100,
            recent_comments_limit: 50,
            max_page_size: 50,
        }
    }
}

/// Video/non-video interleaving constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    pub max_consecutive_videos: usize,
    pub max_consecutive_posts: usize,
    /// Target interleave ratio: one video per `posts_per_video` non-video items
    pub posts_per_video: usize,
    /// Fraction of each stream kept strictly in score order; the tail
    /// is shuffled for diversity
    pub strict_head_fraction: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_videos: 2,
            max_consecutive_posts: 4,
            posts_per_video: 3,
            strict_head_fraction: 0.7,
        }
    }
}

/// Cache TTLs and pressure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub hot_ttl_secs: u64,
    pub warm_ttl_secs: u64,
    pub cold_ttl_secs: u64,
    pub soft_entry_limit: usize,
    pub hard_entry_limit: usize,
    pub profile_ttl_secs: u64,
    pub engagement_ttl_secs: u64,
    pub seen_ttl_secs: u64,
    pub pressure_check_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl_secs: 60,
            warm_ttl_secs: 300,
            cold_ttl_secs: 900,
            soft_entry_limit: 10_000,
            hard_entry_limit: 50_000,
            profile_ttl_secs: 420, // 7 minutes
            engagement_ttl_secs: 180, // 3 minutes
            seen_ttl_secs: 86_400, // 24 hours
            pressure_check_secs: 30,
        }
    }
}

/// View write-back batching windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    pub flush_interval_ms: u64,
    /// Accumulated content ids that trigger an early flush
    pub flush_size_threshold: usize,
    /// Window within which repeat (content, viewer) views are no-ops
    pub dedup_cooldown_secs: u64,
    /// Ceiling on retained entries during store outages; oldest dropped past it
    pub max_pending_entries: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 2_000,
            flush_size_threshold: 500,
            dedup_cooldown_secs: 60,
            max_pending_entries: 10_000,
        }
    }
}

/// External ranking service endpoint. Best-effort: the local formula is
/// the guaranteed scoring path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub enabled: bool,
    pub url: String,
    /// Must stay strictly below the overall request budget
    pub timeout_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:8501/predict".to_string(),
            timeout_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
            burst_size: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                port: env_or("APP_PORT", "8080").parse().context("APP_PORT")?,
                log_level: env_or("LOG_LEVEL", "info"),
            },
            ranking: RankingConfig {
                recency_weight: env_or("RANK_RECENCY_WEIGHT", "0.25").parse()?,
                engagement_weight: env_or("RANK_ENGAGEMENT_WEIGHT", "0.30").parse()?,
                relationship_weight: env_or("RANK_RELATIONSHIP_WEIGHT", "0.25").parse()?,
                preference_weight: env_or("RANK_PREFERENCE_WEIGHT", "0.20").parse()?,
                jitter_fraction: env_or("RANK_JITTER_FRACTION", "0.12").parse()?,
                ..RankingConfig::default()
            },
            fetch: FetchConfig {
                followed_ratio: env_or("FETCH_FOLLOWED_RATIO", "0.6").parse()?,
                overfetch_multiplier: env_or("FETCH_OVERFETCH_MULTIPLIER", "3").parse()?,
                ..FetchConfig::default()
            },
            mixer: MixerConfig {
                max_consecutive_videos: env_or("MIX_MAX_CONSECUTIVE_VIDEOS", "2").parse()?,
                max_consecutive_posts: env_or("MIX_MAX_CONSECUTIVE_POSTS", "4").parse()?,
                ..MixerConfig::default()
            },
            cache: CacheConfig {
                soft_entry_limit: env_or("CACHE_SOFT_ENTRY_LIMIT", "10000").parse()?,
                hard_entry_limit: env_or("CACHE_HARD_ENTRY_LIMIT", "50000").parse()?,
                ..CacheConfig::default()
            },
            batcher: BatcherConfig {
                flush_interval_ms: env_or("BATCH_FLUSH_INTERVAL_MS", "2000").parse()?,
                flush_size_threshold: env_or("BATCH_FLUSH_SIZE_THRESHOLD", "500").parse()?,
                ..BatcherConfig::default()
            },
            predictor: PredictorConfig {
                enabled: env_or("PREDICTOR_ENABLED", "false").parse()?,
                url: env_or("PREDICTOR_URL", "http://127.0.0.1:8501/predict"),
                timeout_ms: env_or("PREDICTOR_TIMEOUT_MS", "150").parse()?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: env_or("RATE_LIMIT_RPM", "120").parse()?,
                burst_size: env_or("RATE_LIMIT_BURST", "20").parse()?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make ranking or mixing nonsensical.
    pub fn validate(&self) -> anyhow::Result<()> {
        let weight_sum = self.ranking.recency_weight
            + self.ranking.engagement_weight
            + self.ranking.relationship_weight
            + self.ranking.preference_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            bail!("ranking weights must sum to 1.0, got {weight_sum}");
        }
        if !(0.0..=1.0).contains(&self.fetch.followed_ratio) {
            bail!("followed_ratio must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.mixer.strict_head_fraction) {
            bail!("strict_head_fraction must be within [0, 1]");
        }
        if self.mixer.max_consecutive_videos == 0 || self.mixer.max_consecutive_posts == 0 {
            bail!("consecutive run limits must be nonzero");
        }
        if self.fetch.overfetch_multiplier == 0 || self.fetch.max_page_size == 0 {
            bail!("fetch limits must be nonzero");
        }
        if self.cache.hard_entry_limit < self.cache.soft_entry_limit {
            bail!("hard_entry_limit must be >= soft_entry_limit");
        }
        if !(0.0..1.0).contains(&self.ranking.jitter_fraction) {
            bail!("jitter_fraction must be within [0, 1)");
        }
        Ok(())
    }

    pub fn predictor_timeout(&self) -> Duration {
        Duration::from_millis(self.predictor.timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                env: "test".to_string(),
                port: 8080,
                log_level: "info".to_string(),
            },
            ranking: RankingConfig::default(),
            fetch: FetchConfig::default(),
            mixer: MixerConfig::default(),
            cache: CacheConfig::default(),
            batcher: BatcherConfig::default(),
            predictor: PredictorConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
