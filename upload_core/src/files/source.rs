use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Decides whether a temp path was produced by the request layer rather
/// than handed in as an arbitrary local file.
pub trait UploadSource: Send + Sync {
    fn is_uploaded(&self, path: &Path) -> bool;
}

/// Directory the HTTP layer streams request bodies into. Only regular files
/// sitting directly inside it count as uploads.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty temp file inside the staging directory. It is removed
    /// on drop unless moved away first.
    pub fn create_temp(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".tmp")
            .tempfile_in(&self.root)
    }

    fn check(&self, path: &Path) -> io::Result<bool> {
        let meta = fs::symlink_metadata(path)?;
        if !meta.file_type().is_file() {
            return Ok(false);
        }

        let root = self.root.canonicalize()?;
        let file = path.canonicalize()?;
        Ok(file.parent() == Some(root.as_path()))
    }
}

impl UploadSource for StagingArea {
    fn is_uploaded(&self, path: &Path) -> bool {
        match self.check(path) {
            Ok(inside) => inside,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot verify upload source");
                false
            }
        }
    }
}
