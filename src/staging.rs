//! Temporary staging of cookbooks for upload.
//!
//! The loader only understands a `<dir>/<cookbook name>/` layout. When metadata
//! is compiled into a source cookbook, the cookbook is exposed under a
//! temporary directory with its real name, either as a symlink to the source
//! root or as a copy of it.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How the source cookbook appears inside the staging directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// Directory symlink to the source root.
    #[default]
    Symlink,
    /// Recursive copy of the source root.
    Copy,
}

/// A temporary directory owned by one upload call.
///
/// Dropping the area first deletes the registered compiled-metadata artifact
/// (if any) and then removes the directory.
pub struct StagingArea {
    mode: StagingMode,
    artifact: Option<PathBuf>,
    dir: TempDir,
}

impl StagingArea {
    /// Create the directory under `parent`, or the system temp dir.
    pub fn new(mode: StagingMode, parent: Option<&Path>) -> Result<Self, UploadError> {
        let parent = parent
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("cookbook-upload")
            .tempdir_in(&parent)
            .map_err(|source| UploadError::Staging {
                path: parent.clone(),
                source,
            })?;
        debug!(path = %dir.path().display(), ?mode, "Created staging directory");
        Ok(Self {
            mode,
            artifact: None,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn mode(&self) -> StagingMode {
        self.mode
    }

    /// Delete `path` when this area is dropped.
    pub fn remove_on_drop(&mut self, path: PathBuf) {
        self.artifact = Some(path);
    }

    /// Expose `source_root` as `<staging dir>/<name>` and return that path.
    pub fn stage(&self, name: &str, source_root: &Path) -> Result<PathBuf, UploadError> {
        let target = self.dir.path().join(name);
        let result = match self.mode {
            StagingMode::Symlink => symlink_dir(source_root, &target),
            StagingMode::Copy => copy_tree(source_root, &target),
        };
        result.map_err(|source| UploadError::Staging {
            path: target.clone(),
            source,
        })?;
        debug!(
            source = %source_root.display(),
            target = %target.display(),
            mode = ?self.mode,
            "Staged cookbook"
        );
        Ok(target)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            match std::fs::remove_file(&artifact) {
                Ok(()) => debug!(path = %artifact.display(), "Removed compiled metadata"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %artifact.display(),
                    error = %e,
                    "Failed to remove compiled metadata"
                ),
            }
        }
    }
}

#[cfg(unix)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, target)
}

fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn source_cookbook() -> TempDir {
        let source = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("recipes")).unwrap();
        fs::write(source.path().join("recipes/default.rb"), "package 'httpd'").unwrap();
        fs::write(source.path().join("README.md"), "# apache2").unwrap();
        source
    }

    #[test]
    fn test_symlink_staging_aliases_source() {
        let source = source_cookbook();
        let area = StagingArea::new(StagingMode::Symlink, None).unwrap();
        let staged = area.stage("apache2", source.path()).unwrap();

        assert_eq!(staged, area.path().join("apache2"));
        assert!(fs::symlink_metadata(&staged).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(staged.join("recipes/default.rb")).unwrap(),
            "package 'httpd'"
        );
    }

    #[test]
    fn test_copy_staging_copies_tree() {
        let source = source_cookbook();
        let area = StagingArea::new(StagingMode::Copy, None).unwrap();
        let staged = area.stage("apache2", source.path()).unwrap();

        assert!(!fs::symlink_metadata(&staged).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(staged.join("README.md")).unwrap(), "# apache2");
    }

    #[test]
    fn test_drop_removes_directory_and_artifact() {
        let source = source_cookbook();
        let artifact = source.path().join("metadata.json");
        fs::write(&artifact, "{}").unwrap();

        let mut area = StagingArea::new(StagingMode::Symlink, None).unwrap();
        area.stage("apache2", source.path()).unwrap();
        area.remove_on_drop(artifact.clone());
        let dir = area.path().to_path_buf();
        drop(area);

        assert!(!dir.exists());
        assert!(!artifact.exists());
        // the symlink target survives
        assert!(source.path().join("recipes/default.rb").exists());
    }

    #[test]
    fn test_created_under_parent() {
        let parent = TempDir::new().unwrap();
        let area = StagingArea::new(StagingMode::Copy, Some(parent.path())).unwrap();
        assert!(area.path().starts_with(parent.path()));
        drop(area);
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_tolerates_missing_artifact() {
        let mut area = StagingArea::new(StagingMode::Copy, None).unwrap();
        area.remove_on_drop(area.path().join("missing.json"));
        drop(area);
    }
}
