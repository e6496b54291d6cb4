//! Request options shared by every REST client built from the tree root.

use std::collections::BTreeMap;
use std::time::Duration;

/// Header used to negotiate the server API version.
pub const API_VERSION_HEADER: &str = "X-Ops-Server-API-Version";

/// Response schema family a client asks the server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionClass {
    /// Cookbook manifest versions: v0/v1 segment manifests, v2 `all_files`.
    ManifestVersions,
}

impl VersionClass {
    pub fn min_version(&self) -> u32 {
        match self {
            VersionClass::ManifestVersions => 0,
        }
    }

    pub fn max_version(&self) -> u32 {
        match self {
            VersionClass::ManifestVersions => 2,
        }
    }

    /// Version requested when nothing else was negotiated.
    pub fn preferred_version(&self) -> u32 {
        self.max_version()
    }
}

/// Options applied to each request a client sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestOptions {
    pub timeout: Option<Duration>,
    pub headers: BTreeMap<String, String>,
    pub version_class: Option<VersionClass>,
}

impl RestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_version_class(mut self, version_class: VersionClass) -> Self {
        self.version_class = Some(version_class);
        self
    }

    /// Merge `overrides` on top of `self`. Fields set in `overrides` win;
    /// headers are unioned with `overrides` winning on conflicts.
    pub fn merge(&self, overrides: &RestOptions) -> RestOptions {
        let mut headers = self.headers.clone();
        for (name, value) in &overrides.headers {
            headers.insert(name.clone(), value.clone());
        }
        RestOptions {
            timeout: overrides.timeout.or(self.timeout),
            headers,
            version_class: overrides.version_class.or(self.version_class),
        }
    }

    /// API version the client sends; 0 without a version class.
    pub fn api_version(&self) -> u32 {
        self.version_class
            .map(|class| class.preferred_version())
            .unwrap_or(0)
    }
}
