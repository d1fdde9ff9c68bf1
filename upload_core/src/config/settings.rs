use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::files::{NamingStrategy, UploadOptions, ValidationRules};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a request body, multipart framing included.
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub destination_dir: PathBuf,
    pub staging_dir: PathBuf,
    /// Multipart field carrying the file.
    pub field_name: String,
    pub max_size: Option<u64>,
    pub allowed_mime: Option<Vec<String>>,
    pub allowed_ext: Option<Vec<String>>,
    /// `time`, `md5` or `uniqid`.
    pub naming: String,
    pub replace: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            destination_dir: PathBuf::from("./uploads"),
            staging_dir: PathBuf::from("./temp"),
            field_name: "image".to_string(),
            max_size: Some(500 * 1024),
            allowed_mime: None,
            allowed_ext: Some(vec![
                "jpg".to_string(),
                "png".to_string(),
                "gif".to_string(),
            ]),
            naming: "time".to_string(),
            replace: true,
        }
    }
}

impl UploadConfig {
    pub fn rules(&self) -> ValidationRules {
        let mut rules = ValidationRules::new();
        if let Some(max_size) = self.max_size {
            rules = rules.with_max_size(max_size);
        }
        if let Some(mimes) = &self.allowed_mime {
            rules = rules.with_allowed_mime(mimes);
        }
        if let Some(exts) = &self.allowed_ext {
            rules = rules.with_allowed_ext(exts);
        }
        rules
    }

    pub fn options(&self) -> UploadOptions {
        UploadOptions::new(self.rules())
            .with_strategy(NamingStrategy::from_name(&self.naming))
            .with_replace(self.replace)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("upload.allowed_mime")
                .with_list_parse_key("upload.allowed_ext"),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "Max body size must be greater than 0".to_string(),
            ));
        }

        if self.upload.max_size == Some(0) {
            return Err(ConfigError::Message(
                "Max upload size must be greater than 0".to_string(),
            ));
        }

        if self.upload.field_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Upload field name cannot be empty".to_string(),
            ));
        }

        if self.upload.staging_dir == self.upload.destination_dir {
            return Err(ConfigError::Message(
                "Staging and destination directories must differ".to_string(),
            ));
        }

        if let Some(max_size) = self.upload.max_size {
            if max_size as usize > self.server.max_body_bytes {
                tracing::warn!(
                    max_size,
                    max_body_bytes = self.server.max_body_bytes,
                    "max upload size exceeds request body limit"
                );
            }
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.upload.destination_dir)?;
        std::fs::create_dir_all(&self.upload.staging_dir)?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
