//! CLI Tooling
//!
//! Lists the cookbooks on the server and uploads local cookbooks through the
//! `/cookbooks` collection node.

use crate::config::{cookbook_path, ChefFsConfig, ConfigLoader};
use crate::error::FsError;
use crate::fs::{CookbookSource, CookbooksDir, RepositoryCookbookDir, ServerRoot, UploadOptions};
use crate::logging::LoggingConfig;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Cookbook FS CLI - the cookbook server as a filesystem tree
#[derive(Parser)]
#[command(name = "cookbook-fs")]
#[command(about = "Browse and upload cookbooks on a cookbook server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Cli {
    /// Logging config from the loaded config with CLI overrides applied.
    pub fn logging_config(&self, config: &ChefFsConfig) -> LoggingConfig {
        let mut logging = config.logging.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        logging
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List cookbooks on the server
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show whether a cookbook exists on the server
    Show {
        /// Cookbook name
        name: String,
    },
    /// Upload cookbooks from local directories
    Upload {
        /// Cookbook directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Freeze the uploaded versions
        #[arg(long)]
        freeze: bool,
        /// Overwrite frozen versions
        #[arg(long)]
        force: bool,
    },
}

/// Everything a command needs: the server tree.
pub struct CliContext {
    cookbooks: CookbooksDir,
}

impl CliContext {
    /// Build the context from configuration, seeding the process-wide
    /// cookbook path with any explicit setting.
    pub fn new(config: &ChefFsConfig) -> anyhow::Result<Self> {
        if let Some(path) = &config.cookbook_path {
            cookbook_path::set(Some(path.clone()));
        }
        let root = ServerRoot::from_config(config)?;
        Ok(Self::with_root(Arc::new(root)))
    }

    pub fn with_root(root: Arc<ServerRoot>) -> Self {
        Self {
            cookbooks: root.cookbooks_dir(),
        }
    }

    pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ChefFsConfig> {
        ConfigLoader::load_optional(path).context("Failed to load configuration")
    }

    pub fn cookbooks(&self) -> &CookbooksDir {
        &self.cookbooks
    }

    /// Execute a CLI command, returning its output.
    pub async fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::List { format } => self.list(format).await,
            Commands::Show { name } => self.show(name).await,
            Commands::Upload {
                paths,
                freeze,
                force,
            } => {
                let options = UploadOptions {
                    freeze: *freeze,
                    force: *force,
                };
                self.upload(paths, &options).await
            }
        }
    }

    async fn list(&self, format: &str) -> anyhow::Result<String> {
        let children = self.cookbooks.children().await?;
        match format {
            "json" => {
                let names: Vec<&str> = children.iter().map(|child| child.name()).collect();
                Ok(serde_json::to_string_pretty(&json!({
                    "cookbooks": names,
                    "total": names.len(),
                }))?)
            }
            "text" => {
                if children.is_empty() {
                    return Ok("No cookbooks on the server.".to_string());
                }
                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["Cookbook", "Path"]);
                for child in children.iter() {
                    table.add_row(vec![child.name().to_string(), child.path()]);
                }
                Ok(table.to_string())
            }
            other => Err(anyhow!("Invalid format: {} (must be 'text' or 'json')", other)),
        }
    }

    async fn show(&self, name: &str) -> anyhow::Result<String> {
        // The entry alone does not know whether the cookbook exists; the
        // listing is authoritative.
        let entry = self.cookbooks.make_child_entry(name);
        let exists = entry.exists()
            || self
                .cookbooks
                .children()
                .await?
                .iter()
                .any(|child| child.name() == name);
        Ok(format!(
            "{}: {}",
            entry.path(),
            if exists { "present" } else { "absent" }
        ))
    }

    async fn upload(&self, paths: &[PathBuf], options: &UploadOptions) -> anyhow::Result<String> {
        let mut lines = Vec::new();
        for path in paths {
            let source = RepositoryCookbookDir::from_path(path)
                .with_context(|| format!("Not a cookbook directory: {}", path.display()))?;
            match self.cookbooks.create_child_from(&source, options).await {
                Ok(()) => {
                    info!(cookbook = %source.name(), "Upload complete");
                    lines.push(format!("Uploaded {}", source.name()));
                }
                Err(e @ FsError::CookbookFrozen { .. }) => {
                    return Err(anyhow!("{} (use --force to overwrite)", e));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(lines.join("\n"))
    }
}
