pub mod image_type;
pub mod manager;
pub mod models;
pub mod naming;
pub mod filesystem;
pub mod source;
pub mod validation;

pub use image_type::ImageType;
pub use manager::{UploadState, Uploader};
pub use models::{IncomingFile, NamingStrategy, UploadOptions, UploadResult, ValidationRules};
pub use naming::{build_save_name, is_safe_save_name};
pub use filesystem::{FileSystem, LocalFs};
pub use source::{StagingArea, UploadSource};
pub use validation::{ErrorKind, UploadError, UploadValidator};
