//! Root of the server tree (`/`).

use crate::config::{ChefFsConfig, UploadConfig};
use crate::error::{ApiError, TransportError};
use crate::fs::chef_server::CookbooksDir;
use crate::rest::{ReqwestConnector, RestClient, RestConnector, RestOptions};
use serde_json::Value;
use std::sync::Arc;

/// Owns the server connection settings every child node builds clients from.
pub struct ServerRoot {
    url: String,
    options: RestOptions,
    connector: Arc<dyn RestConnector>,
    rest: Arc<dyn RestClient>,
    upload: UploadConfig,
}

impl ServerRoot {
    pub fn new(
        url: impl Into<String>,
        options: RestOptions,
        connector: Arc<dyn RestConnector>,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        let rest = connector.connect(&url, options.clone())?;
        Ok(Self {
            url,
            options,
            connector,
            rest,
            upload: UploadConfig::default(),
        })
    }

    /// Root for the configured server using the reqwest transport.
    pub fn from_config(config: &ChefFsConfig) -> Result<Self, ApiError> {
        let url = config.server.url()?;
        let root = Self::new(url, config.server.rest_options(), Arc::new(ReqwestConnector))
            .map_err(|e| ApiError::ConfigError(format!("Failed to create REST client: {}", e)))?;
        Ok(root.with_upload_config(config.upload.clone()))
    }

    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    pub fn path(&self) -> &str {
        "/"
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &RestOptions {
        &self.options
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    /// Client using the root's own options.
    pub fn chef_rest(&self) -> Arc<dyn RestClient> {
        self.rest.clone()
    }

    /// New client for the root URL with `overrides` merged into the root options.
    pub fn chef_rest_with(
        &self,
        overrides: &RestOptions,
    ) -> Result<Arc<dyn RestClient>, TransportError> {
        self.connector
            .connect(&self.url, self.options.merge(overrides))
    }

    pub async fn get_json(&self, api_path: &str) -> Result<Value, TransportError> {
        self.rest.get_json(api_path).await
    }

    /// The `/cookbooks` collection.
    pub fn cookbooks_dir(self: &Arc<Self>) -> CookbooksDir {
        CookbooksDir::new(self.clone())
    }
}
