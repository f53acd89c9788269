//! GET /api/v1/feed

use crate::error::{AppError, Result};
use crate::handlers::{user_id_from, AppState};
use crate::models::{ContentTypeFilter, QualityFilter};
use crate::services::FeedRequest;
use actix_web::{web, HttpRequest, HttpResponse};
use base64::Engine as _;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub content_type: Option<String>,
    pub quality: Option<String>,
    pub refresh: Option<bool>,
}

pub async fn get_feed(
    req: HttpRequest,
    query: web::Query<FeedQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = user_id_from(&req)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE as u32)
        .clamp(1, state.max_page_size) as usize;

    let cursor = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let content_type: ContentTypeFilter = query
        .content_type
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(AppError::BadRequest)?;
    let quality: QualityFilter = query
        .quality
        .as_deref()
        .unwrap_or("auto")
        .parse()
        .map_err(AppError::BadRequest)?;

    let response = state
        .feed
        .get_feed(FeedRequest {
            user_id,
            limit,
            cursor,
            content_type,
            quality,
            refresh: query.refresh.unwrap_or(false),
        })
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// Cursors are opaque to clients: base64 over the last served content id.
fn decode_cursor(raw: &str) -> Result<Uuid> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map_err(|_| AppError::BadRequest("malformed cursor".to_string()))?;
    let decoded =
        String::from_utf8(bytes).map_err(|_| AppError::BadRequest("malformed cursor".to_string()))?;
    Uuid::parse_str(&decoded).map_err(|_| AppError::BadRequest("malformed cursor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trip() {
        let id = Uuid::new_v4();
        let encoded = base64::engine::general_purpose::STANDARD.encode(id.to_string());
        assert_eq!(decode_cursor(&encoded).unwrap(), id);
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        assert!(decode_cursor("not-base64!!").is_err());
        let not_uuid = base64::engine::general_purpose::STANDARD.encode("hello");
        assert!(decode_cursor(&not_uuid).is_err());
    }
}
