//! Uploads one cookbook version to the server.
//!
//! Protocol: optional frozen pre-check, checksum sandbox, file uploads,
//! sandbox commit, then the manifest `PUT`.

use crate::config::cookbook_path;
use crate::cookbook::chefignore::Chefignore;
use crate::cookbook::version::CookbookVersion;
use crate::error::{TransportError, UploadError};
use crate::rest::RestClient;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SandboxResponse {
    sandbox_id: String,
    #[serde(default)]
    checksums: HashMap<String, SandboxChecksum>,
}

#[derive(Debug, Deserialize)]
struct SandboxChecksum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    needs_upload: bool,
}

pub struct CookbookUploader {
    cookbook: CookbookVersion,
    force: bool,
    rest: Arc<dyn RestClient>,
    repo_path: Option<PathBuf>,
}

impl CookbookUploader {
    pub fn new(cookbook: CookbookVersion, force: bool, rest: Arc<dyn RestClient>) -> Self {
        Self {
            cookbook,
            force,
            rest,
            repo_path: None,
        }
    }

    /// Repository directory holding the cookbook. Without it the uploader
    /// falls back to the process-wide cookbook path setting.
    pub fn with_repo_path(mut self, repo_path: impl Into<PathBuf>) -> Self {
        self.repo_path = Some(repo_path.into());
        self
    }

    pub fn cookbook(&self) -> &CookbookVersion {
        &self.cookbook
    }

    fn cookbook_url(&self) -> String {
        format!(
            "cookbooks/{}/{}",
            self.cookbook.name(),
            self.cookbook.version()
        )
    }

    pub async fn upload_cookbooks(mut self) -> Result<(), UploadError> {
        self.apply_repository_chefignore()?;

        if !self.force {
            self.check_not_frozen().await?;
        }

        if !self.cookbook.files().is_empty() {
            self.upload_sandbox().await?;
        }

        let mut url = self.cookbook_url();
        if self.force {
            url.push_str("?force=true");
        }
        let manifest = self.cookbook.manifest(self.rest.api_version());
        self.rest.put_json(&url, &manifest).await?;

        info!(
            cookbook = %self.cookbook.name(),
            version = %self.cookbook.version(),
            frozen = self.cookbook.is_frozen(),
            force = self.force,
            "Uploaded cookbook"
        );
        Ok(())
    }

    fn apply_repository_chefignore(&mut self) -> Result<(), UploadError> {
        let Some(repo_path) = self.repo_path.clone().or_else(cookbook_path::get) else {
            return Ok(());
        };
        if let Some(ignore) = Chefignore::load_from_dir(&repo_path)? {
            self.cookbook.retain_files(|file| !ignore.ignored(&file.path));
        }
        Ok(())
    }

    async fn check_not_frozen(&self) -> Result<(), UploadError> {
        match self.rest.get_json(&self.cookbook_url()).await {
            Ok(existing) => {
                if existing.get("frozen?").and_then(Value::as_bool) == Some(true) {
                    return Err(UploadError::Frozen {
                        cookbook: self.cookbook.name().to_string(),
                        version: self.cookbook.version().to_string(),
                    });
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload_sandbox(&self) -> Result<(), UploadError> {
        let mut checksums = Map::new();
        for file in self.cookbook.files() {
            checksums.insert(file.checksum.clone(), Value::Null);
        }
        let response = self
            .rest
            .post_json("sandboxes", &json!({ "checksums": checksums }))
            .await?;
        let sandbox: SandboxResponse = serde_json::from_value(response)
            .map_err(|e| TransportError::InvalidResponse(format!("sandbox: {}", e)))?;

        for (checksum, status) in &sandbox.checksums {
            if !status.needs_upload {
                continue;
            }
            let url = status.url.as_deref().ok_or_else(|| {
                TransportError::InvalidResponse(format!("no upload url for checksum {}", checksum))
            })?;
            let file = self
                .cookbook
                .files()
                .iter()
                .find(|file| &file.checksum == checksum)
                .ok_or_else(|| {
                    TransportError::InvalidResponse(format!("unknown checksum {}", checksum))
                })?;
            let content =
                std::fs::read(&file.full_path).map_err(|source| crate::error::LoadError::Io {
                    path: file.full_path.clone(),
                    source,
                })?;
            debug!(file = %file.path, %checksum, "Uploading file");
            self.rest.put_bytes(url, content).await?;
        }

        self.rest
            .put_json(
                &format!("sandboxes/{}", sandbox.sandbox_id),
                &json!({ "is_completed": true }),
            )
            .await?;
        Ok(())
    }
}
