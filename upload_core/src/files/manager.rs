use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::models::{extension_of, IncomingFile, UploadOptions, UploadResult, ValidationRules};
use super::naming::{build_save_name, is_safe_save_name};
use super::filesystem::{FileSystem, LocalFs};
use super::source::{StagingArea, UploadSource};
use super::validation::{UploadError, UploadValidator};

/// Lifecycle of a single upload call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Validating,
    Rejected,
    Validated,
    Moved,
    MoveFailed,
    DirectoryCreateFailed,
    NameCollision,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            UploadState::Pending | UploadState::Validating | UploadState::Validated
        )
    }
}

/// Validates staged uploads and moves accepted ones into a date-partitioned
/// destination tree.
#[derive(Clone)]
pub struct Uploader {
    source: Arc<dyn UploadSource>,
    fs: Arc<dyn FileSystem>,
}

impl Uploader {
    pub fn new(source: impl UploadSource + 'static, fs: impl FileSystem + 'static) -> Self {
        Self {
            source: Arc::new(source),
            fs: Arc::new(fs),
        }
    }

    pub fn with_staging_area(staging: StagingArea) -> Self {
        Self::new(staging, LocalFs)
    }

    pub fn validate(&self, file: &IncomingFile, rules: &ValidationRules) -> Result<(), UploadError> {
        UploadValidator::new(self.source.as_ref(), self.fs.as_ref()).validate(file, rules)
    }

    pub fn upload(
        &self,
        file: &IncomingFile,
        destination_dir: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> Result<UploadResult, UploadError> {
        let mut state = UploadState::Pending;
        transition(&mut state, UploadState::Validating, file);

        if let Err(e) = self.validate(file, &options.rules) {
            transition(&mut state, UploadState::Rejected, file);
            warn!(
                original_name = %file.original_name,
                kind = %e.kind(),
                error = %e,
                "upload rejected"
            );
            return Err(e);
        }
        transition(&mut state, UploadState::Validated, file);

        let root = normalize_destination(destination_dir.as_ref());
        let savename = build_save_name(&file.original_name, &options.strategy);
        if !is_safe_save_name(&savename) {
            transition(&mut state, UploadState::Rejected, file);
            warn!(savename = %savename, "save name escapes the destination");
            return Err(UploadError::InvalidSaveName { name: savename });
        }
        let target = root.join(&savename);

        if !options.replace && self.fs.exists(&target) {
            transition(&mut state, UploadState::NameCollision, file);
            warn!(path = %target.display(), "upload target already exists");
            return Err(UploadError::NameCollision { path: target });
        }

        if let Some(parent) = target.parent() {
            if !parent.is_dir() {
                if let Err(source) = self.fs.create_dir_all(parent) {
                    transition(&mut state, UploadState::DirectoryCreateFailed, file);
                    warn!(path = %parent.display(), error = %source, "failed to create upload directory");
                    return Err(UploadError::DirectoryCreateFailed {
                        path: parent.to_path_buf(),
                        source,
                    });
                }
            }
        }

        if let Err(source) = self.fs.move_file(file.path(), &target) {
            transition(&mut state, UploadState::MoveFailed, file);
            warn!(path = %target.display(), error = %source, "failed to move upload");
            return Err(UploadError::MoveFailed { path: target, source });
        }
        transition(&mut state, UploadState::Moved, file);

        let filename = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = extension_of(&filename).to_string();
        let size = match self.fs.size(&target) {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "failed to stat stored upload");
                file.declared_size
            }
        };

        info!(
            savename = %savename,
            size = size,
            original_name = %file.original_name,
            "upload stored"
        );

        Ok(UploadResult {
            savename,
            filename,
            ext,
            size,
        })
    }
}

fn transition(state: &mut UploadState, next: UploadState, file: &IncomingFile) {
    debug!(
        from = ?*state,
        to = ?next,
        terminal = next.is_terminal(),
        tmp_path = %file.tmp_path.display(),
        "upload state change"
    );
    *state = next;
}

/// Strip trailing separators and re-append exactly one.
fn normalize_destination(dir: &Path) -> PathBuf {
    let raw = dir.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    PathBuf::from(format!("{}{}", trimmed, MAIN_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{ErrorKind, NamingStrategy};
    use std::io::{self, Write};
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    struct TestSetup {
        staging_dir: TempDir,
        dest_dir: TempDir,
        uploader: Uploader,
    }

    fn create_test_setup() -> TestSetup {
        let staging_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let uploader = Uploader::with_staging_area(StagingArea::new(staging_dir.path()));
        TestSetup {
            staging_dir,
            dest_dir,
            uploader,
        }
    }

    fn stage(setup: &TestSetup, data: &[u8], original_name: &str) -> IncomingFile {
        let staging = StagingArea::new(setup.staging_dir.path());
        let mut tmp = staging.create_temp().unwrap();
        tmp.write_all(data).unwrap();
        let (_, path) = tmp.keep().unwrap();
        IncomingFile::new(path, original_name, data.len() as u64)
    }

    #[test]
    fn test_normalize_destination() {
        let sep = MAIN_SEPARATOR;
        assert_eq!(normalize_destination(Path::new("uploads")), PathBuf::from(format!("uploads{}", sep)));
        assert_eq!(normalize_destination(Path::new("uploads///")), PathBuf::from(format!("uploads{}", sep)));
        assert_eq!(normalize_destination(Path::new("/")), PathBuf::from(sep.to_string()));
    }

    #[test]
    fn test_upload_moves_file() {
        let setup = create_test_setup();
        let file = stage(&setup, &PNG_HEADER, "pixel.png");

        let result = setup
            .uploader
            .upload(&file, setup.dest_dir.path(), &UploadOptions::default())
            .unwrap();

        assert_eq!(result.ext, "png");
        assert_eq!(result.size, 8);
        assert!(result.savename.ends_with(&result.filename));
        assert!(!file.path().exists());
        assert!(setup.dest_dir.path().join(&result.savename).is_file());
    }

    #[test]
    fn test_rejected_upload_is_not_moved() {
        let setup = create_test_setup();
        let file = stage(&setup, b"not an image", "x.png");

        let err = setup
            .uploader
            .upload(&file, setup.dest_dir.path(), &UploadOptions::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidImage);
        assert!(file.path().exists());
        assert_eq!(std::fs::read_dir(setup.dest_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_replace_false_detects_collision() {
        let setup = create_test_setup();
        let options = UploadOptions::default()
            .with_strategy(NamingStrategy::Explicit("fixed".to_string()))
            .with_replace(false);

        let first = stage(&setup, b"first", "a.txt");
        setup.uploader.upload(&first, setup.dest_dir.path(), &options).unwrap();

        let second = stage(&setup, b"second", "b.txt");
        let err = setup
            .uploader
            .upload(&second, setup.dest_dir.path(), &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameCollision);
        assert!(second.path().exists());
    }

    #[test]
    fn test_directory_create_failure() {
        let setup = create_test_setup();
        let blocker = setup.dest_dir.path().join("blocked");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();

        let file = stage(&setup, b"data", "a.txt");
        let err = setup
            .uploader
            .upload(&file, &blocker, &UploadOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryCreateFailed);
        assert!(file.path().exists());
    }

    struct FailingMove;

    impl FileSystem for FailingMove {
        fn size(&self, path: &Path) -> io::Result<u64> {
            LocalFs.size(path)
        }
        fn sniff_mime(&self, path: &Path) -> io::Result<String> {
            LocalFs.sniff_mime(path)
        }
        fn image_type(&self, path: &Path) -> io::Result<Option<crate::files::ImageType>> {
            LocalFs.image_type(path)
        }
        fn exists(&self, path: &Path) -> bool {
            LocalFs.exists(path)
        }
        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            LocalFs.create_dir_all(path)
        }
        fn move_file(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only destination"))
        }
    }

    #[test]
    fn test_move_failure() {
        let setup = create_test_setup();
        let uploader = Uploader::new(StagingArea::new(setup.staging_dir.path()), FailingMove);
        let file = stage(&setup, b"data", "a.txt");

        let err = uploader
            .upload(&file, setup.dest_dir.path(), &UploadOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MoveFailed);
        assert!(file.path().exists());
    }

    /// Stats fine in staging, fails once the file reaches `dest`.
    struct FailingStat {
        dest: PathBuf,
    }

    impl FileSystem for FailingStat {
        fn size(&self, path: &Path) -> io::Result<u64> {
            if path.starts_with(&self.dest) {
                return Err(io::Error::new(io::ErrorKind::Other, "stat failed"));
            }
            LocalFs.size(path)
        }
        fn sniff_mime(&self, path: &Path) -> io::Result<String> {
            LocalFs.sniff_mime(path)
        }
        fn image_type(&self, path: &Path) -> io::Result<Option<crate::files::ImageType>> {
            LocalFs.image_type(path)
        }
        fn exists(&self, path: &Path) -> bool {
            LocalFs.exists(path)
        }
        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            LocalFs.create_dir_all(path)
        }
        fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
            LocalFs.move_file(from, to)
        }
    }

    #[test]
    fn test_stat_failure_after_move_still_succeeds() {
        let setup = create_test_setup();
        let fs = FailingStat {
            dest: setup.dest_dir.path().to_path_buf(),
        };
        let uploader = Uploader::new(StagingArea::new(setup.staging_dir.path()), fs);
        let file = stage(&setup, b"stored bytes", "notes.txt");

        let result = uploader
            .upload(&file, setup.dest_dir.path(), &UploadOptions::default())
            .unwrap();
        assert_eq!(result.size, file.declared_size);
        assert!(setup.dest_dir.path().join(&result.savename).is_file());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UploadState::Pending.is_terminal());
        assert!(!UploadState::Validated.is_terminal());
        assert!(UploadState::Rejected.is_terminal());
        assert!(UploadState::Moved.is_terminal());
        assert!(UploadState::NameCollision.is_terminal());
    }
}
