use axum::{
    extract::{Multipart, State},
    Json,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::{
    error::{AppError, Result},
    files::{IncomingFile, UploadResult},
    models::ApiResponse,
    AppState,
};

/// Accept a multipart form, stage the configured file field and hand it to
/// the uploader.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResult>>> {
    let field_name = state.config.field_name.as_str();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(field_name) {
            debug!(field = ?field.name(), "skipping multipart field");
            continue;
        }

        let original_name = field
            .file_name()
            .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?
            .to_string();

        let staged = state.staging.create_temp()?;
        let mut out = tokio::fs::File::from_std(staged.reopen()?);
        let mut written: u64 = 0;

        while let Some(chunk) = field.chunk().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        drop(out);

        // removes the staged file on drop if it was not moved
        let tmp_path = staged.into_temp_path();
        let incoming = IncomingFile::new(tmp_path.to_path_buf(), original_name, written);

        info!(
            original_name = %incoming.original_name,
            size = written,
            "received upload"
        );

        let uploader = state.uploader.clone();
        let destination = state.config.destination_dir.clone();
        let options = state.config.options();

        let result = tokio::task::spawn_blocking(move || {
            uploader.upload(&incoming, &destination, &options)
        })
        .await
        .map_err(|e| anyhow::anyhow!("upload task failed: {}", e))??;

        drop(tmp_path);

        return Ok(Json(ApiResponse::success(result).with_message("File uploaded")));
    }

    Err(AppError::BadRequest(format!(
        "No file found in field '{}'",
        field_name
    )))
}
