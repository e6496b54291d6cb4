//! REST transport against the cookbook server.
//!
//! The tree only talks to the server through [`RestClient`]; clients are built
//! for a base URL and option set by a [`RestConnector`], so the same node code
//! runs against the reqwest-backed [`ServerApi`] or an in-memory server.

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod options;
pub mod server_api;

pub use options::{RestOptions, VersionClass, API_VERSION_HEADER};
pub use server_api::{ReqwestConnector, ServerApi};

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Authenticated JSON client bound to one server base URL.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Base URL every relative path is resolved against.
    fn url(&self) -> &str;

    fn options(&self) -> &RestOptions;

    /// API version sent with each request.
    fn api_version(&self) -> u32 {
        self.options().api_version()
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError>;

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    /// GET raw bytes, typically from a file URL listed in a manifest.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// PUT raw bytes, typically to an absolute URL handed out by the server.
    async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError>;
}

/// Builds clients for a base URL and option set.
pub trait RestConnector: Send + Sync {
    fn connect(
        &self,
        url: &str,
        options: RestOptions,
    ) -> Result<Arc<dyn RestClient>, TransportError>;
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
