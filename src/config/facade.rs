//! ConfigLoader: built-in defaults, an optional TOML file, then the
//! `COOKBOOK_FS__*` environment overlay.

use super::ChefFsConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Prefix for configuration environment variables.
/// `COOKBOOK_FS__SERVER__URL` maps to `server.url`.
pub const ENV_PREFIX: &str = "COOKBOOK_FS";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults plus the environment.
    pub fn load() -> Result<ChefFsConfig, ConfigError> {
        Self::build(Config::builder())
    }

    /// A required TOML file under the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<ChefFsConfig, ConfigError> {
        debug!(path = %path.display(), "Loading configuration file");
        let builder = Config::builder().add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(true),
        );
        Self::build(builder)
    }

    pub fn load_optional(path: Option<&Path>) -> Result<ChefFsConfig, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<ChefFsConfig, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
