use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use crate::{models::ApiResponse, AppState};

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let staging_ok = state.staging.root().is_dir();
    let destination_ok = state.config.destination_dir.is_dir();

    let status_code = if staging_ok && destination_ok {
        StatusCode::OK
    } else {
        warn!(staging_ok, destination_ok, "upload directories unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ApiResponse::success(serde_json::json!({
        "status": if status_code == StatusCode::OK { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().timestamp(),
        "version": state.version,
        "staging_dir": staging_ok,
        "destination_dir": destination_ok,
    }));

    (status_code, Json(body))
}
