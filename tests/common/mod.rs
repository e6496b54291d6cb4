//! Shared fixtures: an in-memory server behind a tree root, plus a local
//! repository and staging parent in temp directories.

#![allow(dead_code)]

use cookbook_fs::config::UploadConfig;
use cookbook_fs::fs::{CookbooksDir, RepositoryCookbookDir, ServerRoot};
use cookbook_fs::rest::memory::{MemoryConnector, MemoryServer};
use cookbook_fs::rest::{RestConnector, RestOptions};
use cookbook_fs::staging::StagingMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub server: Arc<MemoryServer>,
    pub connector: Arc<MemoryConnector>,
    pub root: Arc<ServerRoot>,
    pub cookbooks: CookbooksDir,
    pub repo: TempDir,
    pub staging: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_mode(StagingMode::Symlink)
    }

    pub fn with_mode(mode: StagingMode) -> Self {
        Self::build(mode, |connector| connector as Arc<dyn RestConnector>)
    }

    /// Fixture whose tree reaches the server through `wrap(connector)`.
    pub fn wrapped(wrap: impl FnOnce(Arc<MemoryConnector>) -> Arc<dyn RestConnector>) -> Self {
        Self::build(StagingMode::Symlink, wrap)
    }

    fn build(
        mode: StagingMode,
        wrap: impl FnOnce(Arc<MemoryConnector>) -> Arc<dyn RestConnector>,
    ) -> Self {
        let server = MemoryServer::new();
        let connector = MemoryConnector::new(server.clone());
        let staging = TempDir::new().unwrap();
        let root = ServerRoot::new("memory://server", RestOptions::default(), wrap(connector.clone()))
            .unwrap()
            .with_upload_config(UploadConfig {
                staging: mode,
                staging_dir: Some(staging.path().to_path_buf()),
            });
        let root = Arc::new(root);
        let cookbooks = root.cookbooks_dir();
        Self {
            server,
            connector,
            root,
            cookbooks,
            repo: TempDir::new().unwrap(),
            staging,
        }
    }

    /// `<repo>/<name>` with a `metadata.json` and one recipe.
    pub fn json_cookbook(&self, name: &str, version: &str) -> RepositoryCookbookDir {
        let dir = self.cookbook_root(name);
        fs::write(
            dir.join("metadata.json"),
            format!(r#"{{"name":"{}","version":"{}"}}"#, name, version),
        )
        .unwrap();
        RepositoryCookbookDir::new(self.repo.path(), name)
    }

    /// `<repo>/<name>` with only a `metadata.toml`, so uploading compiles metadata.
    pub fn toml_cookbook(&self, name: &str, version: &str) -> RepositoryCookbookDir {
        let dir = self.cookbook_root(name);
        fs::write(
            dir.join("metadata.toml"),
            format!("name = \"{}\"\nversion = \"{}\"\n", name, version),
        )
        .unwrap();
        RepositoryCookbookDir::new(self.repo.path(), name)
    }

    pub fn cookbook_path(&self, name: &str) -> PathBuf {
        self.repo.path().join(name)
    }

    pub fn staging_entries(&self) -> usize {
        fs::read_dir(self.staging.path()).unwrap().count()
    }

    fn cookbook_root(&self, name: &str) -> PathBuf {
        let dir = self.repo.path().join(name);
        fs::create_dir_all(dir.join("recipes")).unwrap();
        fs::write(
            dir.join("recipes/default.rb"),
            format!("# {} default recipe\n", name),
        )
        .unwrap();
        dir
    }
}

pub fn checksum_of(path: &Path) -> String {
    hex::encode(blake3::hash(&fs::read(path).unwrap()).as_bytes())
}
