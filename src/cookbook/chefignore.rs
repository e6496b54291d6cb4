//! `chefignore` files: glob patterns for files never uploaded.

use crate::error::LoadError;
use glob::Pattern;
use std::path::Path;

pub const CHEFIGNORE_FILE: &str = "chefignore";

#[derive(Debug, Clone, Default)]
pub struct Chefignore {
    patterns: Vec<Pattern>,
}

impl Chefignore {
    /// One glob per line; `#` starts a comment, blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self, LoadError> {
        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let pattern = Pattern::new(line).map_err(|e| LoadError::InvalidIgnorePattern {
                pattern: line.to_string(),
                message: e.to_string(),
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// Load `<dir>/chefignore`, or `None` when the directory has none.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, LoadError> {
        let path = dir.join(CHEFIGNORE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map(Some)
    }

    /// Whether a cookbook-relative path (forward slashes) is ignored.
    pub fn ignored(&self, relative_path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(relative_path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
