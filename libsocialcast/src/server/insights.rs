//! Insights endpoint
//!
//! `GET /api/social/insights/{platform}/{postId}?site=<siteKey>` returns the
//! combined engagement summary for one published post.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::server::AppState;
use crate::types::TargetPlatform;

pub async fn handle_insights(
    State(state): State<AppState>,
    Path((platform, post_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let platform: TargetPlatform = match platform.parse() {
        Ok(platform) => platform,
        Err(e) => {
            return error_json(StatusCode::BAD_REQUEST, "Unsupported platform", &e);
        }
    };

    let site_key = query
        .get("site")
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("default");

    match state.metrics.insights_for(platform, &post_id, site_key).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!("Failed to fetch insights for {}/{}: {}", platform, post_id, e);
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch insights",
                &e.to_string(),
            )
        }
    }
}

fn error_json(status: StatusCode, error: &str, details: &str) -> Response {
    let body = serde_json::json!({
        "error": error,
        "details": details,
        "status": status.as_u16(),
    });
    (status, Json(body)).into_response()
}
