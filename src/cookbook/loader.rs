//! Loads a cookbook directory into a [`CookbookVersion`].

use crate::cookbook::chefignore::Chefignore;
use crate::cookbook::metadata::{CookbookMetadata, METADATA_JSON, METADATA_TOML};
use crate::cookbook::version::{CookbookFile, CookbookVersion};
use crate::error::LoadError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Reads metadata and file checksums from `<path>`.
///
/// A symlinked cookbook root is followed, so a staged alias loads the same
/// content as its target while reporting the alias as `root_dir`.
pub struct CookbookVersionLoader {
    path: PathBuf,
    chefignore: Option<Chefignore>,
}

impl CookbookVersionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chefignore: None,
        }
    }

    /// Filter files through `chefignore` in addition to the cookbook's own.
    pub fn with_chefignore(mut self, chefignore: Option<Chefignore>) -> Self {
        self.chefignore = chefignore;
        self
    }

    pub fn load(&self) -> Result<CookbookVersion, LoadError> {
        if !self.path.is_dir() {
            return Err(LoadError::NotFound(self.path.clone()));
        }

        let metadata = self.read_metadata()?;
        let own_ignore = Chefignore::load_from_dir(&self.path)?;
        let ignores: Vec<&Chefignore> = self.chefignore.iter().chain(own_ignore.iter()).collect();

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.path)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| LoadError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.path.clone()),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_path(&self.path, entry.path());
            if ignores.iter().any(|ignore| ignore.ignored(&relative)) {
                debug!(file = %relative, "Ignoring cookbook file");
                continue;
            }
            files.push(checksum_file(entry.path(), relative)?);
        }

        debug!(
            cookbook = %metadata.name,
            version = %metadata.version,
            files = files.len(),
            path = %self.path.display(),
            "Loaded cookbook"
        );
        Ok(CookbookVersion::new(metadata, self.path.clone(), files))
    }

    /// `metadata.json` wins over `metadata.toml`; without either the
    /// directory name is the cookbook name.
    fn read_metadata(&self) -> Result<CookbookMetadata, LoadError> {
        let json_path = self.path.join(METADATA_JSON);
        if json_path.is_file() {
            return CookbookMetadata::from_json_file(&json_path);
        }
        let toml_path = self.path.join(METADATA_TOML);
        if toml_path.is_file() {
            return CookbookMetadata::from_toml_file(&toml_path);
        }
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LoadError::InvalidMetadata {
                path: self.path.clone(),
                message: "cookbook has no metadata and no directory name".to_string(),
            })?;
        Ok(CookbookMetadata::new(name))
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn checksum_file(path: &Path, relative: String) -> Result<CookbookFile, LoadError> {
    let content = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = blake3::hash(&content);
    Ok(CookbookFile {
        path: relative,
        checksum: hex::encode(hash.as_bytes()),
        size: content.len() as u64,
        full_path: path.to_path_buf(),
    })
}
