use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file delivered by the request layer, waiting in the staging area.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub tmp_path: PathBuf,
    pub original_name: String,
    pub declared_size: u64,
}

impl IncomingFile {
    pub fn new(tmp_path: impl Into<PathBuf>, original_name: impl Into<String>, declared_size: u64) -> Self {
        Self {
            tmp_path: tmp_path.into(),
            original_name: original_name.into(),
            declared_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.tmp_path
    }

    /// Lowercased extension of the client-supplied name.
    pub fn extension(&self) -> String {
        extension_of(&self.original_name).to_ascii_lowercase()
    }
}

/// Constraints checked before an upload is persisted. A constraint that is
/// not set is not enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    max_size: Option<u64>,
    allowed_mime: Option<BTreeSet<String>>,
    allowed_ext: Option<BTreeSet<String>>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_allowed_mime<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_mime = Some(normalize_set(mimes, |m| m));
        self
    }

    pub fn with_allowed_ext<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_ext = Some(normalize_set(exts, |e| e.trim_start_matches('.')));
        self
    }

    /// Same as [`with_allowed_mime`](Self::with_allowed_mime) for a
    /// comma-separated list such as `"image/png,image/gif"`.
    pub fn with_allowed_mime_list(self, list: &str) -> Self {
        self.with_allowed_mime(list.split(','))
    }

    /// Same as [`with_allowed_ext`](Self::with_allowed_ext) for a
    /// comma-separated list such as `"jpg,png,gif"`.
    pub fn with_allowed_ext_list(self, list: &str) -> Self {
        self.with_allowed_ext(list.split(','))
    }

    pub fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    pub fn allowed_mime(&self) -> Option<&BTreeSet<String>> {
        self.allowed_mime.as_ref()
    }

    pub fn allowed_ext(&self) -> Option<&BTreeSet<String>> {
        self.allowed_ext.as_ref()
    }
}

fn normalize_set<I, S>(items: I, strip: impl Fn(&str) -> &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| strip(item.as_ref().trim()).to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// How the stored file's basename is generated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamingStrategy {
    /// `YYYYMMDDHHMMSS` followed by four random digits.
    #[default]
    Time,
    /// MD5 hex digest of the current high-resolution timestamp.
    Md5,
    /// Process-unique identifier.
    Uniqid,
    /// Caller-chosen basename. The original extension is appended unless
    /// the name already carries one.
    Explicit(String),
}

impl NamingStrategy {
    /// Parse a strategy name. Unknown names fall back to [`NamingStrategy::Time`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "md5" => NamingStrategy::Md5,
            "uniqid" => NamingStrategy::Uniqid,
            "time" => NamingStrategy::Time,
            other => {
                tracing::debug!(strategy = other, "unknown naming strategy, using time");
                NamingStrategy::Time
            }
        }
    }
}

/// Per-call settings for [`Uploader::upload`](super::Uploader::upload).
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub rules: ValidationRules,
    pub strategy: NamingStrategy,
    /// Overwrite a file that already exists under the generated name.
    pub replace: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            rules: ValidationRules::default(),
            strategy: NamingStrategy::Time,
            replace: true,
        }
    }
}

impl UploadOptions {
    pub fn new(rules: ValidationRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: NamingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// Where and how an accepted upload was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Path relative to the destination root, e.g. `20240131/202401311530121234.png`.
    pub savename: String,
    pub filename: String,
    pub ext: String,
    pub size: u64,
}

/// Text after the last `.` of the final path component, or `""`.
pub fn extension_of(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) => &base[idx + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), "JPG");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".htaccess"), "htaccess");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of("dir.d/file"), "");
        assert_eq!(extension_of("C:\\uploads\\x.png"), "png");
    }

    #[test]
    fn test_incoming_extension_lowercased() {
        let file = IncomingFile::new("/tmp/upload-1.tmp", "Holiday.PNG", 10);
        assert_eq!(file.extension(), "png");
        assert_eq!(file.path(), Path::new("/tmp/upload-1.tmp"));
    }

    #[test]
    fn test_rules_normalized() {
        let rules = ValidationRules::new()
            .with_max_size(500 * 1024)
            .with_allowed_ext_list("JPG, .png,gif,,")
            .with_allowed_mime(["Image/PNG ", "image/gif"]);

        assert_eq!(rules.max_size(), Some(512_000));

        let exts: Vec<&str> = rules.allowed_ext().unwrap().iter().map(String::as_str).collect();
        assert_eq!(exts, vec!["gif", "jpg", "png"]);

        let mimes = rules.allowed_mime().unwrap();
        assert!(mimes.contains("image/png"));
        assert!(mimes.contains("image/gif"));
        assert_eq!(mimes.len(), 2);
    }

    #[test]
    fn test_rules_default_enforce_nothing() {
        let rules = ValidationRules::default();
        assert!(rules.max_size().is_none());
        assert!(rules.allowed_mime().is_none());
        assert!(rules.allowed_ext().is_none());
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(NamingStrategy::from_name("md5"), NamingStrategy::Md5);
        assert_eq!(NamingStrategy::from_name(" UNIQID "), NamingStrategy::Uniqid);
        assert_eq!(NamingStrategy::from_name("time"), NamingStrategy::Time);
        assert_eq!(NamingStrategy::from_name("sha1"), NamingStrategy::Time);
    }

    #[test]
    fn test_upload_options_defaults() {
        let options = UploadOptions::default();
        assert!(options.replace);
        assert_eq!(options.strategy, NamingStrategy::Time);

        let options = UploadOptions::new(ValidationRules::new().with_max_size(1))
            .with_strategy(NamingStrategy::Md5)
            .with_replace(false);
        assert!(!options.replace);
        assert_eq!(options.rules.max_size(), Some(1));
    }
}
