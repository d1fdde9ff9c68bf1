//! Filesystem primitives the upload pipeline relies on.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use super::image_type::{ImageType, SIGNATURE_LEN};

/// Bytes read from the head of a file for content sniffing.
const SNIFF_LEN: usize = 8192;

/// Stat, sniff and move operations used by [`Uploader`](super::Uploader).
pub trait FileSystem: Send + Sync {
    fn size(&self, path: &Path) -> io::Result<u64>;

    /// MIME type derived from the file's bytes, lowercased.
    fn sniff_mime(&self, path: &Path) -> io::Result<String>;

    fn image_type(&self, path: &Path) -> io::Result<Option<ImageType>>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Move `from` to `to`, replacing any existing file at `to`.
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    fn read_head(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let file = fs::File::open(path)?;
        let mut head = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut head)?;
        Ok(head)
    }

    fn copy_across(from: &Path, to: &Path) -> io::Result<()> {
        let parent = to.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        let mut source = fs::File::open(from)?;
        io::copy(&mut source, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(to).map_err(|e| e.error)?;
        fs::remove_file(from)
    }
}

impl FileSystem for LocalFs {
    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn sniff_mime(&self, path: &Path) -> io::Result<String> {
        let head = Self::read_head(path, SNIFF_LEN)?;
        Ok(sniff_mime(&head))
    }

    fn image_type(&self, path: &Path) -> io::Result<Option<ImageType>> {
        let head = Self::read_head(path, SIGNATURE_LEN)?;
        Ok(ImageType::detect(&head))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "rename crosses filesystems, copying instead"
                );
                Self::copy_across(from, to)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    const EXDEV: i32 = 18;
    #[cfg(windows)]
    const EXDEV: i32 = 17;
    #[cfg(not(any(unix, windows)))]
    const EXDEV: i32 = -1;

    err.raw_os_error() == Some(EXDEV)
}

/// Classify content by magic bytes, falling back to a text/binary guess
/// when no signature matches.
pub fn sniff_mime(head: &[u8]) -> String {
    if head.is_empty() {
        return "application/x-empty".to_string();
    }

    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_ascii_lowercase();
    }

    if looks_like_text(head) {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // a multi-byte sequence cut at the sniff boundary is still text
        Err(e) => e.error_len().is_none() && head.len() == SNIFF_LEN,
    }
}
