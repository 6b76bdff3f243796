//! Configuration module for the file host.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{FilehostError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size for uploads in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_size() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/filehost.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Blob storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem.
    #[default]
    Local,
    /// Remote object store.
    Remote,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the local backend.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Endpoint URL for the remote backend.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name for the remote backend.
    #[serde(default)]
    pub bucket: String,
}

fn default_storage_path() -> String {
    "data/blobs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            endpoint: String::new(),
            bucket: String::new(),
        }
    }
}

/// File lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Bound on each registry or blob store call, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_password_memory")]
    pub password_memory_kib: u32,
    /// Argon2 iterations.
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
    /// Argon2 parallelism.
    #[serde(default = "default_password_parallelism")]
    pub password_parallelism: u32,
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_password_memory() -> u32 {
    19456
}

fn default_password_iterations() -> u32 {
    2
}

fn default_password_parallelism() -> u32 {
    1
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: default_operation_timeout(),
            password_memory_kib: default_password_memory(),
            password_iterations: default_password_iterations(),
            password_parallelism: default_password_parallelism(),
        }
    }
}

impl FilesConfig {
    /// Operation timeout as a Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filehost.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// File lifecycle configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FilehostError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FilehostError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEHOST_DATABASE_PATH`: Override the database path
    /// - `FILEHOST_STORAGE_PATH`: Override the local blob directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FILEHOST_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(path) = std::env::var("FILEHOST_STORAGE_PATH") {
            if !path.is_empty() {
                self.storage.path = path;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The operation timeout is zero
    /// - The upload size limit is zero
    /// - The remote backend is selected without a bucket
    pub fn validate(&self) -> Result<()> {
        if self.files.operation_timeout_secs == 0 {
            return Err(FilehostError::Config(
                "files.operation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.server.max_upload_size_mb == 0 {
            return Err(FilehostError::Config(
                "server.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Remote && self.storage.bucket.is_empty() {
            return Err(FilehostError::Config(
                "storage.backend is \"remote\" but storage.bucket is not set".to_string(),
            ));
        }
        Ok(())
    }
}
