//! External ranking service client
//!
//! Best-effort call to `POST /predict` with the computed feature vector.
//! The call runs under a timeout strictly shorter than the request budget;
//! any failure or timeout hands scoring back to the deterministic local
//! formula. Nothing here is ever surfaced to the feed caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predict call timed out after {0:?}")]
    Timeout(Duration),

    #[error("predict call failed: {0}")]
    Http(String),

    #[error("predict returned non-finite score")]
    InvalidScore,
}

/// Feature vector sent to the external scorer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub recency_hours: f64,
    pub engagement_score: f64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub view_count: u64,
    pub author_followed: bool,
    pub prior_affinity: bool,
    pub interest_match: f64,
    pub is_video: bool,
    pub viewer_account_age_days: i64,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    score: f64,
}

pub struct PredictorClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl PredictorClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    /// Returns a score clamped to [0, 1]. Callers must treat an `Err` as
    /// "use the local formula", never as a request failure.
    pub async fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
        let request = self.http.post(&self.url).json(features).send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| PredictorError::Timeout(self.timeout))?
            .map_err(|e| PredictorError::Http(e.to_string()))?;

        let body: PredictResponse = response
            .error_for_status()
            .map_err(|e| PredictorError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| PredictorError::Http(e.to_string()))?;

        if !body.score.is_finite() {
            return Err(PredictorError::InvalidScore);
        }

        let score = body.score.clamp(0.0, 1.0);
        debug!(score, "external predictor scored candidate");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_vector_serializes_camel_case() {
        let features = FeatureVector {
            recency_hours: 2.5,
            engagement_score: 42.0,
            like_count: 10,
            comment_count: 3,
            share_count: 1,
            view_count: 200,
            author_followed: true,
            prior_affinity: false,
            interest_match: 0.5,
            is_video: true,
            viewer_account_age_days: 365,
        };

        let json = serde_json::to_value(&features).unwrap();
        assert_eq!(json["recencyHours"], 2.5);
        assert_eq!(json["authorFollowed"], true);
        assert_eq!(json["viewerAccountAgeDays"], 365);
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors_quickly() {
        // Reserved TEST-NET address: connection will not succeed.
        let client = PredictorClient::new(
            "http://192.0.2.1:9/predict".to_string(),
            Duration::from_millis(50),
        );
        let features = FeatureVector {
            recency_hours: 1.0,
            engagement_score: 0.0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            view_count: 0,
            author_followed: false,
            prior_affinity: false,
            interest_match: 0.0,
            is_video: false,
            viewer_account_age_days: 0,
        };

        let result = client.predict(&features).await;
        assert!(result.is_err());
    }
}
