//! One loaded cookbook version.

use crate::cookbook::metadata::{CookbookMetadata, METADATA_JSON, METADATA_TOML};
use crate::error::LoadError;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest segments used by API versions below 2.
const SEGMENTS: &[&str] = &[
    "recipes",
    "attributes",
    "templates",
    "files",
    "libraries",
    "definitions",
    "resources",
    "providers",
];

const ROOT_FILES: &str = "root_files";

/// A file belonging to a cookbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookFile {
    /// Path relative to the cookbook root, `/` separated
    pub path: String,
    /// Hex content checksum
    pub checksum: String,
    pub size: u64,
    /// Location on disk the content is read from
    pub full_path: PathBuf,
}

impl CookbookFile {
    /// Manifest segment the file belongs to.
    pub fn segment(&self) -> &'static str {
        match self.path.split_once('/') {
            Some((first, _)) => SEGMENTS
                .iter()
                .find(|segment| **segment == first)
                .copied()
                .unwrap_or(ROOT_FILES),
            None => ROOT_FILES,
        }
    }

    fn manifest_entry(&self, name: &str) -> Value {
        json!({
            "name": name,
            "path": self.path,
            "checksum": self.checksum,
            "specificity": "default",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CookbookVersion {
    metadata: CookbookMetadata,
    root_dir: PathBuf,
    files: Vec<CookbookFile>,
    frozen: bool,
}

impl CookbookVersion {
    pub fn new(metadata: CookbookMetadata, root_dir: PathBuf, files: Vec<CookbookFile>) -> Self {
        Self {
            metadata,
            root_dir,
            files,
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn metadata(&self) -> &CookbookMetadata {
        &self.metadata
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn files(&self) -> &[CookbookFile] {
        &self.files
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Mark this version immutable on the server once uploaded.
    pub fn freeze_version(&mut self) {
        self.frozen = true;
    }

    /// Keep only the files `keep` accepts.
    pub fn retain_files(&mut self, mut keep: impl FnMut(&CookbookFile) -> bool) {
        self.files.retain(|file| keep(file));
    }

    /// Materialize upload-ready metadata into the cookbook root.
    ///
    /// Returns the path of the generated `metadata.json` when one had to be
    /// compiled from `metadata.toml`, and `None` when the cookbook already
    /// carries `metadata.json` or has no source metadata at all. The caller
    /// owns the generated file and is expected to delete it.
    pub fn compile_metadata(&self) -> Result<Option<PathBuf>, LoadError> {
        let json_path = self.root_dir.join(METADATA_JSON);
        if json_path.exists() {
            return Ok(None);
        }
        let toml_path = self.root_dir.join(METADATA_TOML);
        if !toml_path.is_file() {
            return Ok(None);
        }
        let metadata = CookbookMetadata::from_toml_file(&toml_path)?;
        metadata.write_json_file(&json_path)?;
        debug!(path = %json_path.display(), cookbook = %metadata.name, "Compiled metadata");
        Ok(Some(json_path))
    }

    /// Manifest body for `PUT cookbooks/<name>/<version>`.
    pub fn manifest(&self, api_version: u32) -> Value {
        let mut manifest = json!({
            "name": format!("{}-{}", self.name(), self.version()),
            "cookbook_name": self.name(),
            "version": self.version(),
            "json_class": "Chef::CookbookVersion",
            "chef_type": "cookbook_version",
            "frozen?": self.frozen,
            "metadata": self.metadata,
        });

        if api_version >= 2 {
            let all_files: Vec<Value> = self
                .files
                .iter()
                .map(|file| file.manifest_entry(&file.path))
                .collect();
            manifest["all_files"] = Value::Array(all_files);
        } else {
            let mut segments: BTreeMap<&str, Vec<Value>> = SEGMENTS
                .iter()
                .chain(std::iter::once(&ROOT_FILES))
                .map(|segment| (*segment, Vec::new()))
                .collect();
            for file in &self.files {
                let name = file.path.rsplit('/').next().unwrap_or(&file.path);
                segments
                    .entry(file.segment())
                    .or_default()
                    .push(file.manifest_entry(name));
            }
            for (segment, entries) in segments {
                manifest[segment] = Value::Array(entries);
            }
        }
        manifest
    }
}
