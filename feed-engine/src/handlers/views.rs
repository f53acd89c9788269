//! View recording and lookup endpoints

use crate::error::{AppError, Result};
use crate::handlers::{user_id_from, AppState};
use crate::services::ViewOutcome;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

/// POST /api/v1/content/{id}/view
///
/// Returns `{"cached": true}` when the view was deduplicated within the
/// cooldown window, `{"success": true}` when it was counted.
pub async fn record_view(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let viewer_id = user_id_from(&req)?;
    let content_id = parse_content_id(&path)?;

    let body = match state.feed.record_view(content_id, viewer_id).await? {
        ViewOutcome::Counted => json!({ "success": true }),
        ViewOutcome::Deduplicated => json!({ "cached": true }),
    };
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/v1/content/{id}/views
pub async fn get_view_count(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let content_id = parse_content_id(&path)?;
    let count = state.feed.view_count(content_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "viewCount": count })))
}

/// Malformed ids are a caller error, not a missing resource.
fn parse_content_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid content id '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_bad_request() {
        assert!(parse_content_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_content_id(&id.to_string()).unwrap(), id);
    }
}
