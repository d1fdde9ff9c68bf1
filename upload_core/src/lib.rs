//! Core library for the upload service: validation, naming and storage of
//! uploaded files, plus the HTTP routes that feed them in.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use crate::config::{AppConfig, UploadConfig};
pub use error::{AppError, Result};
pub use files::{
    build_save_name, ErrorKind, FileSystem, ImageType, IncomingFile, LocalFs, NamingStrategy,
    StagingArea, UploadError, UploadOptions, UploadResult, UploadSource, Uploader,
    ValidationRules,
};
pub use handlers::routes::create_routes;

use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub config: Arc<UploadConfig>,
    pub staging: StagingArea,
    pub uploader: Uploader,
}

impl AppState {
    pub fn new(config: UploadConfig) -> Self {
        let staging = StagingArea::new(config.staging_dir.clone());
        let uploader = Uploader::with_staging_area(staging.clone());

        Self {
            app_name: "Upload Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: Arc::new(config),
            staging,
            uploader,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, &AppConfig::default())
}

pub fn create_app_with_config(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(middleware::logging_layer())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
