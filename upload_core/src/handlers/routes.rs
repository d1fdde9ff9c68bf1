//! HTTP routes exposed by the upload service

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{files::upload_file, health::handle_health};
use crate::{models::ApiResponse, AppState};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload", post(upload_file))
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "health": "/health",
            "upload": "/upload"
        },
        "field": state.config.field_name,
    })))
}
