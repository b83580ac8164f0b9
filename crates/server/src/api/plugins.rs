//! Plugin listing and login handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tunehound_core::PluginInfo;

use super::search::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PluginsResponse {
    pub plugins: Vec<PluginInfo>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: String,
    pub logged_in: bool,
}

/// GET /api/v1/plugins
pub async fn list_plugins(State(state): State<Arc<AppState>>) -> Json<PluginsResponse> {
    Json(PluginsResponse {
        plugins: state.registry().list(),
    })
}

/// POST /api/v1/plugins/{id}/login
///
/// Run (or join) the plugin's login flow and report whether it holds a
/// session afterwards.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(plugin) = state.registry().get(&id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown plugin: {}", id),
            }),
        ));
    };
    if !plugin.has_login() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Plugin {} has no login", id),
            }),
        ));
    }

    let logged_in = state.registry().login(&id).await;
    Ok(Json(LoginResponse { id, logged_in }))
}
