//! Configuration for the cookbook filesystem.
//!
//! Precedence (lowest to highest): built-in defaults, optional TOML file,
//! `COOKBOOK_FS__*` environment variables.

pub mod cookbook_path;
mod facade;

pub use facade::{ConfigLoader, ENV_PREFIX};

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::rest::RestOptions;
use crate::staging::StagingMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    60
}

/// Connection settings for the cookbook server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the organization, e.g. `https://chef.example.com/organizations/acme`
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout enforced by the transport
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn url(&self) -> Result<&str, ApiError> {
        match self.url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(url),
            Some(url) => Err(ApiError::ConfigError(format!(
                "Invalid server url: {} (must start with http:// or https://)",
                url
            ))),
            None => Err(ApiError::ConfigError(
                "server.url is not set (config file or COOKBOOK_FS__SERVER__URL)".to_string(),
            )),
        }
    }

    pub fn rest_options(&self) -> RestOptions {
        RestOptions::default().with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Upload behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// How a cookbook with freshly compiled metadata is staged for loading
    #[serde(default)]
    pub staging: StagingMode,

    /// Parent of the per-upload temporary directories; system temp dir when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChefFsConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    /// Explicit cookbook path; seeds the process-wide setting
    #[serde(default)]
    pub cookbook_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}
