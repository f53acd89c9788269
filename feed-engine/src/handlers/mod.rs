pub mod feed;
pub mod views;

use crate::error::{AppError, Result};
use crate::services::FeedService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handler state.
pub struct AppState {
    pub feed: Arc<FeedService>,
    pub max_page_size: u32,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/feed", web::get().to(feed::get_feed))
            .route("/content/{id}/view", web::post().to(views::record_view))
            .route("/content/{id}/views", web::get().to(views::get_view_count)),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(metrics));
}

/// Identity comes from the gateway-injected header; requests without it
/// are rejected before any work happens.
pub fn user_id_from(req: &HttpRequest) -> Result<Uuid> {
    let raw = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".to_string()))?;
    Uuid::parse_str(raw).map_err(|_| AppError::Unauthorized("invalid X-User-Id header".to_string()))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "feed-engine",
    }))
}

async fn metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::gather())
}
