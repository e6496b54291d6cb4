//! Cookbook metadata as uploaded to the server.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Upload-ready metadata file name.
pub const METADATA_JSON: &str = "metadata.json";

/// Source metadata file name compiled into [`METADATA_JSON`].
pub const METADATA_TOML: &str = "metadata.toml";

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookbookMetadata {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub maintainer: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,

    /// Cookbook name -> version constraint
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl CookbookMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            maintainer: String::new(),
            license: String::new(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let content = read(path)?;
        serde_json::from_str(&content).map_err(|e| invalid(path, e))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, LoadError> {
        let content = read(path)?;
        toml::from_str(&content).map_err(|e| invalid(path, e))
    }

    /// Write as JSON. The content goes to a temporary sibling that is renamed
    /// over `path`, so `path` is either absent or complete.
    pub fn write_json_file(&self, path: &Path) -> Result<(), LoadError> {
        let io_error = |source: std::io::Error| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(|e| invalid(path, e))?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".metadata")
            .suffix(".json.tmp")
            .tempfile_in(dir)
            .map_err(io_error)?;
        staged.write_all(content.as_bytes()).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged.persist(path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(path: &Path, err: impl std::fmt::Display) -> LoadError {
    LoadError::InvalidMetadata {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults() {
        let metadata: CookbookMetadata = toml::from_str("name = \"mysql\"\n").unwrap();
        assert_eq!(metadata.name, "mysql");
        assert_eq!(metadata.version, "0.0.0");
        assert!(metadata.dependencies.is_empty());
    }

    #[test]
    fn test_json_round_trip_through_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(METADATA_JSON);
        let mut metadata = CookbookMetadata::new("apache2");
        metadata.version = "8.1.2".to_string();
        metadata.dependencies.insert("iptables".to_string(), ">= 1.0".to_string());
        metadata.write_json_file(&path).unwrap();

        assert_eq!(CookbookMetadata::from_json_file(&path).unwrap(), metadata);
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(METADATA_JSON);
        std::fs::write(&path, "{ not json").unwrap();
        match CookbookMetadata::from_json_file(&path) {
            Err(LoadError::InvalidMetadata { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let temp = tempfile::TempDir::new().unwrap();
        // A directory in the way makes the final rename fail after the
        // content was written.
        let path = temp.path().join(METADATA_JSON);
        std::fs::create_dir(&path).unwrap();

        let err = CookbookMetadata::new("apache2")
            .write_json_file(&path)
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { path: ref p, .. } if p == &path));
        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(METADATA_JSON)]);
        assert!(path.is_dir());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(METADATA_JSON);
        std::fs::write(&path, "{ truncated").unwrap();

        CookbookMetadata::new("apache2").write_json_file(&path).unwrap();
        assert_eq!(
            CookbookMetadata::from_json_file(&path).unwrap().name,
            "apache2"
        );
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
