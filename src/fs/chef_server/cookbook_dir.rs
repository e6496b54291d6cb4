//! One cookbook under `/cookbooks`.

use std::fmt;

/// A cookbook entry in the collection.
///
/// `exists` is true for entries discovered through a server listing and false
/// for candidates built by name lookup; those are resolved later by whoever
/// consults the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookDir {
    name: String,
    parent_path: String,
    exists: bool,
}

impl CookbookDir {
    pub fn new(name: impl Into<String>, parent_path: impl Into<String>, exists: bool) -> Self {
        Self {
            name: name.into(),
            parent_path: parent_path.into(),
            exists,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.parent_path.trim_end_matches('/'), self.name)
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Cookbooks are always directory shaped.
    pub fn is_dir(&self) -> bool {
        true
    }
}

impl fmt::Display for CookbookDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
