//! Configuration management for the stamp server

use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the local artifact tree
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Request body ceiling for uploads, in MiB
    pub max_upload_mb: usize,
}

impl LimitsConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                upload_dir: PathBuf::from("uploads"),
            },
            limits: LimitsConfig { max_upload_mb: 50 },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("SERVER_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "SERVER_PORT", value })?,
            None => defaults.server.port,
        };

        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => match value.to_lowercase().as_str() {
                "local" => StorageBackend::Local,
                "memory" => StorageBackend::Memory,
                _ => return Err(ConfigError::InvalidValue { key: "STORAGE_BACKEND", value }),
            },
            None => defaults.storage.backend,
        };

        let max_upload_mb = match lookup("MAX_UPLOAD_MB") {
            Some(value) => match value.parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                _ => return Err(ConfigError::InvalidValue { key: "MAX_UPLOAD_MB", value }),
            },
            None => defaults.limits.max_upload_mb,
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
            },
            storage: StorageConfig {
                backend,
                upload_dir: lookup("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
            },
            limits: LimitsConfig { max_upload_mb },
        })
    }
}
