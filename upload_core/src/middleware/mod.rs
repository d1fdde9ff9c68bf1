//! Middleware components for the upload service

pub mod logging;

pub use logging::logging_layer;
