//! A cookbook version on the server, fetched so it can be created elsewhere.
//!
//! The manifest files are downloaded into a temporary `<dir>/<name>/` tree
//! that lives as long as the source, so the upload path sees a remote
//! cookbook exactly like a repository one.

use crate::cookbook::metadata::METADATA_JSON;
use crate::cookbook::{CookbookMetadata, CookbookVersion, CookbookVersionLoader};
use crate::error::{FsError, LoadError, TransportError, UploadError};
use crate::fs::repository::CookbookSource;
use crate::rest::RestClient;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RemoteManifest {
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    all_files: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    path: String,
    checksum: String,
    #[serde(default)]
    url: Option<String>,
}

/// Downloaded copy of `cookbooks/<name>/<version>`.
pub struct RemoteCookbookSource {
    name: String,
    version: String,
    dir: TempDir,
}

impl RemoteCookbookSource {
    /// Download every file of the version's manifest, checking checksums.
    ///
    /// `rest` must negotiate manifest version 2 (`all_files`). `entry` names
    /// the tree path reported when the version does not exist.
    pub async fn fetch(
        rest: &dyn RestClient,
        entry: &str,
        name: &str,
        version: &str,
        parent: Option<&Path>,
    ) -> Result<Self, FsError> {
        let manifest = rest
            .get_json(&format!("cookbooks/{}/{}", name, version))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    FsError::NotFound {
                        entry: entry.to_string(),
                        cause: e,
                    }
                } else {
                    FsError::Transport(e)
                }
            })?;
        let manifest: RemoteManifest = serde_json::from_value(manifest).map_err(|e| {
            TransportError::InvalidResponse(format!("cookbook manifest {}: {}", name, e))
        })?;

        let parent = parent
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("cookbook-fetch")
            .tempdir_in(&parent)
            .map_err(|source| staging_error(&parent, source))?;
        let root = dir.path().join(name);

        let mut has_metadata = false;
        for file in &manifest.all_files {
            let relative = manifest_relative_path(&file.path)?;
            let url = file.url.as_deref().ok_or_else(|| {
                TransportError::InvalidResponse(format!("no url for file {}", file.path))
            })?;
            let content = rest.get_bytes(url).await?;
            let checksum = hex::encode(blake3::hash(&content).as_bytes());
            if checksum != file.checksum {
                return Err(TransportError::InvalidResponse(format!(
                    "checksum mismatch for {}: expected {}, got {}",
                    file.path, file.checksum, checksum
                ))
                .into());
            }

            let target = root.join(&relative);
            if let Some(folder) = target.parent() {
                std::fs::create_dir_all(folder).map_err(|source| staging_error(folder, source))?;
            }
            std::fs::write(&target, &content).map_err(|source| staging_error(&target, source))?;
            has_metadata |= relative == Path::new(METADATA_JSON);
            debug!(file = %file.path, %checksum, "Fetched cookbook file");
        }

        // Without the file, the loader would only know the directory name.
        if !has_metadata {
            std::fs::create_dir_all(&root).map_err(|source| staging_error(&root, source))?;
            let metadata = manifest
                .metadata
                .and_then(|metadata| serde_json::from_value::<CookbookMetadata>(metadata).ok())
                .unwrap_or_else(|| {
                    let mut metadata = CookbookMetadata::new(name);
                    metadata.version = version.to_string();
                    metadata
                });
            metadata
                .write_json_file(&root.join(METADATA_JSON))
                .map_err(UploadError::Load)?;
        }

        debug!(
            cookbook = %name,
            %version,
            files = manifest.all_files.len(),
            path = %root.display(),
            "Fetched cookbook"
        );
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            dir,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Local root of the downloaded cookbook.
    pub fn root_dir(&self) -> PathBuf {
        self.dir.path().join(&self.name)
    }
}

impl CookbookSource for RemoteCookbookSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn chef_object(&self) -> Result<CookbookVersion, LoadError> {
        CookbookVersionLoader::new(self.root_dir()).load()
    }

    fn parent_file_path(&self) -> &Path {
        self.dir.path()
    }
}

/// Manifest paths are relative and may not climb out of the cookbook.
fn manifest_relative_path(path: &str) -> Result<PathBuf, TransportError> {
    let relative = Path::new(path);
    let plain = !path.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if plain {
        Ok(relative.to_path_buf())
    } else {
        Err(TransportError::InvalidResponse(format!(
            "unsafe file path in manifest: {:?}",
            path
        )))
    }
}

fn staging_error(path: &Path, source: std::io::Error) -> FsError {
    FsError::Upload(UploadError::Staging {
        path: path.to_path_buf(),
        source,
    })
}
