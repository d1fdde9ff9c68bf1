use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::image_type::{is_image_like, ImageType};
use super::models::{IncomingFile, ValidationRules};
use super::filesystem::FileSystem;
use super::source::UploadSource;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Illegitimate upload source: {}", .path.display())]
    IllegitimateSource { path: PathBuf },

    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    TooLarge { size: u64, max_size: u64 },

    #[error("MIME type not allowed: {mime}")]
    DisallowedMime { mime: String },

    #[error("File extension not allowed: {ext:?}")]
    DisallowedExtension { ext: String },

    #[error("Invalid image file: {filename}")]
    InvalidImage {
        filename: String,
        detected: Option<ImageType>,
    },

    #[error("Invalid save name: {name:?}")]
    InvalidSaveName { name: String },

    #[error("A file with the same name already exists: {}", .path.display())]
    NameCollision { path: PathBuf },

    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move upload to {}: {source}", .path.display())]
    MoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Stable tag for each failure, suitable for response bodies and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    IllegitimateSource,
    TooLarge,
    DisallowedMime,
    DisallowedExtension,
    InvalidImage,
    InvalidSaveName,
    NameCollision,
    DirectoryCreateFailed,
    MoveFailed,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::IllegitimateSource => "IllegitimateSource",
            ErrorKind::TooLarge => "TooLarge",
            ErrorKind::DisallowedMime => "DisallowedMime",
            ErrorKind::DisallowedExtension => "DisallowedExtension",
            ErrorKind::InvalidImage => "InvalidImage",
            ErrorKind::InvalidSaveName => "InvalidSaveName",
            ErrorKind::NameCollision => "NameCollision",
            ErrorKind::DirectoryCreateFailed => "DirectoryCreateFailed",
            ErrorKind::MoveFailed => "MoveFailed",
            ErrorKind::Io => "Io",
        }
    }

    /// Failures caused by the uploaded content rather than the server.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            ErrorKind::IllegitimateSource
                | ErrorKind::TooLarge
                | ErrorKind::DisallowedMime
                | ErrorKind::DisallowedExtension
                | ErrorKind::InvalidImage
                | ErrorKind::InvalidSaveName
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::IllegitimateSource { .. } => ErrorKind::IllegitimateSource,
            UploadError::TooLarge { .. } => ErrorKind::TooLarge,
            UploadError::DisallowedMime { .. } => ErrorKind::DisallowedMime,
            UploadError::DisallowedExtension { .. } => ErrorKind::DisallowedExtension,
            UploadError::InvalidImage { .. } => ErrorKind::InvalidImage,
            UploadError::InvalidSaveName { .. } => ErrorKind::InvalidSaveName,
            UploadError::NameCollision { .. } => ErrorKind::NameCollision,
            UploadError::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            UploadError::MoveFailed { .. } => ErrorKind::MoveFailed,
            UploadError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Runs the guard checks in order: source, size, MIME, extension, image
/// signature. Stops at the first failure.
pub struct UploadValidator<'a> {
    source: &'a dyn UploadSource,
    fs: &'a dyn FileSystem,
}

impl<'a> UploadValidator<'a> {
    pub fn new(source: &'a dyn UploadSource, fs: &'a dyn FileSystem) -> Self {
        Self { source, fs }
    }

    pub fn validate(&self, file: &IncomingFile, rules: &ValidationRules) -> Result<(), UploadError> {
        self.check_source(file)?;

        if let Some(max_size) = rules.max_size() {
            self.check_size(file, max_size)?;
        }

        if let Some(allowed) = rules.allowed_mime() {
            let mime = self.fs.sniff_mime(file.path())?.to_ascii_lowercase();
            if !allowed.contains(&mime) {
                return Err(UploadError::DisallowedMime { mime });
            }
        }

        if let Some(allowed) = rules.allowed_ext() {
            let ext = file.extension();
            if !allowed.contains(&ext) {
                return Err(UploadError::DisallowedExtension { ext });
            }
        }

        // runs whether or not MIME/extension rules are configured
        self.check_image(file)
    }

    fn check_source(&self, file: &IncomingFile) -> Result<(), UploadError> {
        if self.source.is_uploaded(file.path()) {
            Ok(())
        } else {
            Err(UploadError::IllegitimateSource {
                path: file.tmp_path.clone(),
            })
        }
    }

    fn check_size(&self, file: &IncomingFile, max_size: u64) -> Result<(), UploadError> {
        let size = self.fs.size(file.path())?;
        if size > max_size {
            return Err(UploadError::TooLarge { size, max_size });
        }
        if size != file.declared_size {
            tracing::debug!(
                declared = file.declared_size,
                actual = size,
                "declared size differs from staged file"
            );
        }
        Ok(())
    }

    fn check_image(&self, file: &IncomingFile) -> Result<(), UploadError> {
        if !is_image_like(&file.extension()) {
            return Ok(());
        }

        let detected = self.fs.image_type(file.path())?;
        match detected {
            Some(image_type) if image_type.is_accepted() => Ok(()),
            _ => Err(UploadError::InvalidImage {
                filename: file.original_name.clone(),
                detected,
            }),
        }
    }
}
