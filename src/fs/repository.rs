//! Cookbooks in a local repository directory.

use crate::cookbook::{Chefignore, CookbookVersion, CookbookVersionLoader};
use crate::error::LoadError;
use std::path::{Path, PathBuf};

/// The source side of an upload.
pub trait CookbookSource: Send + Sync {
    fn name(&self) -> &str;

    /// Load the cookbook version this entry represents.
    fn chef_object(&self) -> Result<CookbookVersion, LoadError>;

    /// Directory holding this cookbook, i.e. the real cookbook path.
    fn parent_file_path(&self) -> &Path;
}

/// `<repo>/<name>` on disk.
#[derive(Debug, Clone)]
pub struct RepositoryCookbookDir {
    name: String,
    repo_path: PathBuf,
}

impl RepositoryCookbookDir {
    pub fn new(repo_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_path: repo_path.into(),
        }
    }

    /// Entry for a cookbook directory given by path.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let canonical =
            dunce::canonicalize(path).map_err(|_| LoadError::NotFound(path.to_path_buf()))?;
        let (Some(name), Some(parent)) = (canonical.file_name(), canonical.parent()) else {
            return Err(LoadError::NotFound(path.to_path_buf()));
        };
        Ok(Self::new(parent, name.to_string_lossy()))
    }

    /// Every cookbook directory in `repo_path`, sorted by name.
    pub fn list(repo_path: &Path) -> Result<Vec<Self>, LoadError> {
        let entries = std::fs::read_dir(repo_path).map_err(|source| LoadError::Io {
            path: repo_path.to_path_buf(),
            source,
        })?;
        let mut cookbooks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io {
                path: repo_path.to_path_buf(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !name.starts_with('.') {
                cookbooks.push(Self::new(repo_path, name));
            }
        }
        cookbooks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cookbooks)
    }

    pub fn file_path(&self) -> PathBuf {
        self.repo_path.join(&self.name)
    }
}

impl CookbookSource for RepositoryCookbookDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn chef_object(&self) -> Result<CookbookVersion, LoadError> {
        CookbookVersionLoader::new(self.file_path())
            .with_chefignore(Chefignore::load_from_dir(&self.repo_path)?)
            .load()
    }

    fn parent_file_path(&self) -> &Path {
        &self.repo_path
    }
}
