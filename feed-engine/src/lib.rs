//! Personalized feed ranking and delivery engine
//!
//! Assembles per-user feed pages from candidate content: profile-driven
//! candidate pools, engagement-aware relevance scoring with an optional
//! external predictor, video/non-video mixing, seen-content exclusion and
//! batched view-count write-back.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod stores;

pub use config::Config;
pub use error::{AppError, Result};
