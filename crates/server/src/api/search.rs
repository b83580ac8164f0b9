//! Search API handler.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tunehound_core::{ScoredCandidate, SearchRequest};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: SearchRequest,
    pub candidates: Vec<ScoredCandidate>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /api/v1/search?title=&artist=
///
/// Ranked, deduplicated candidates across all enabled plugins.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)> {
    if params.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "title is required".to_string(),
            }),
        ));
    }

    let artist = params.artist.as_deref().filter(|a| !a.trim().is_empty());
    let request = SearchRequest::new(params.title.trim(), artist.map(str::trim));

    let started = Instant::now();
    let candidates = state.orchestrator().search_all(&request).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    info!(
        title = %request.title,
        results = candidates.len(),
        duration_ms,
        "Search request served"
    );

    Ok(Json(SearchResponse {
        query: request,
        candidates,
        duration_ms,
    }))
}
