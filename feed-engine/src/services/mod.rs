pub mod candidates;
pub mod engagement;
pub mod feed;
pub mod mixer;
pub mod predictor;
pub mod profile;
pub mod scoring;
pub mod view_batcher;

pub use candidates::{CandidateSet, ContentCandidateFetcher};
pub use engagement::EngagementMetricsCollector;
pub use feed::{FeedRequest, FeedService};
pub use mixer::{FeedMixer, MixedFeed};
pub use predictor::{FeatureVector, PredictorClient, PredictorError};
pub use profile::UserProfileAggregator;
pub use scoring::ScoringEngine;
pub use view_batcher::{ViewIncrementBatcher, ViewOutcome};
