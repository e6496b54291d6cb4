//! In-memory cookbook server.
//!
//! Speaks the subset of the server API the tree uses (cookbook listing,
//! cookbook versions, checksum sandboxes) and records every request, so the
//! tree and uploader can be exercised without a network. Failures can be
//! injected per method and path prefix.
//!
//! Built for this crate's unit tests and with the `test-support` feature.

use crate::error::TransportError;
use crate::rest::{RestClient, RestConnector, RestOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const UPLOAD_URL_PREFIX: &str = "memory://upload/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path relative to the base URL, query string included
    pub path: String,
    pub api_version: u32,
}

struct InjectedFailure {
    method: Method,
    path_prefix: String,
    error: TransportError,
    once: bool,
}

#[derive(Default)]
struct ServerState {
    /// cookbook name -> version -> stored manifest
    cookbooks: BTreeMap<String, BTreeMap<String, Value>>,
    files: HashMap<String, Vec<u8>>,
    sandboxes: HashMap<String, Vec<String>>,
    next_sandbox: u64,
    requests: Vec<RecordedRequest>,
    failures: Vec<InjectedFailure>,
}

#[derive(Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
}

impl MemoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a cookbook version.
    pub fn add_cookbook(&self, name: &str, version: &str, frozen: bool) {
        let manifest = json!({
            "cookbook_name": name,
            "version": version,
            "frozen?": frozen,
        });
        self.state
            .lock()
            .cookbooks
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string(), manifest);
    }

    /// Fail every request matching `method` and `path_prefix` with `error`.
    pub fn fail_always(&self, method: Method, path_prefix: &str, error: TransportError) {
        self.inject(method, path_prefix, error, false);
    }

    /// Fail the next request matching `method` and `path_prefix` with `error`.
    pub fn fail_next(&self, method: Method, path_prefix: &str, error: TransportError) {
        self.inject(method, path_prefix, error, true);
    }

    fn inject(&self, method: Method, path_prefix: &str, error: TransportError, once: bool) {
        self.state.lock().failures.push(InjectedFailure {
            method,
            path_prefix: path_prefix.to_string(),
            error,
            once,
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests with this method and exact path.
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn cookbook(&self, name: &str, version: &str) -> Option<Value> {
        self.state
            .lock()
            .cookbooks
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
    }

    pub fn stored_file(&self, checksum: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(checksum).cloned()
    }

    fn handle(
        &self,
        method: Method,
        path: &str,
        api_version: u32,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let path = path.trim_start_matches('/');
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            api_version,
        });

        if let Some(index) = state
            .failures
            .iter()
            .position(|f| f.method == method && path.starts_with(&f.path_prefix))
        {
            let error = state.failures[index].error.clone();
            if state.failures[index].once {
                state.failures.remove(index);
            }
            return Err(error);
        }

        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, query),
            None => (path, ""),
        };
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["cookbooks"]) => {
                let mut listing = Map::new();
                for (name, versions) in &state.cookbooks {
                    let versions: Vec<Value> = versions
                        .keys()
                        .map(|version| json!({ "version": version }))
                        .collect();
                    listing.insert(name.clone(), json!({ "versions": versions }));
                }
                Ok(Value::Object(listing))
            }
            (Method::Get, ["cookbooks", name, version]) => state
                .cookbooks
                .get(*name)
                .and_then(|versions| versions.get(*version))
                .cloned()
                .map(with_file_urls)
                .ok_or_else(not_found),
            (Method::Put, ["cookbooks", name, version]) => {
                let force = query.split('&').any(|pair| pair == "force=true");
                let existing_frozen = state
                    .cookbooks
                    .get(*name)
                    .and_then(|versions| versions.get(*version))
                    .and_then(|manifest| manifest.get("frozen?"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if existing_frozen && !force {
                    return Err(TransportError::Http {
                        status: 409,
                        message: "Conflict".to_string(),
                    });
                }
                let manifest = body.cloned().unwrap_or(Value::Null);
                state
                    .cookbooks
                    .entry(name.to_string())
                    .or_default()
                    .insert(version.to_string(), manifest.clone());
                Ok(manifest)
            }
            (Method::Post, ["sandboxes"]) => {
                let requested: Vec<String> = body
                    .and_then(|b| b.get("checksums"))
                    .and_then(Value::as_object)
                    .map(|checksums| checksums.keys().cloned().collect())
                    .unwrap_or_default();
                state.next_sandbox += 1;
                let sandbox_id = format!("sandbox-{}", state.next_sandbox);
                let mut checksums = Map::new();
                for checksum in &requested {
                    let needs_upload = !state.files.contains_key(checksum);
                    checksums.insert(
                        checksum.clone(),
                        json!({
                            "url": format!("{}{}", UPLOAD_URL_PREFIX, checksum),
                            "needs_upload": needs_upload,
                        }),
                    );
                }
                state.sandboxes.insert(sandbox_id.clone(), requested);
                Ok(json!({
                    "sandbox_id": sandbox_id,
                    "uri": format!("sandboxes/{}", sandbox_id),
                    "checksums": checksums,
                }))
            }
            (Method::Put, ["sandboxes", sandbox_id]) => {
                let checksums = state.sandboxes.get(*sandbox_id).ok_or_else(not_found)?;
                let missing: HashSet<&String> = checksums
                    .iter()
                    .filter(|checksum| !state.files.contains_key(*checksum))
                    .collect();
                if !missing.is_empty() {
                    return Err(TransportError::Http {
                        status: 400,
                        message: "Bad Request".to_string(),
                    });
                }
                Ok(json!({ "is_completed": true }))
            }
            _ => Err(not_found()),
        }
    }

    fn fetch_file(&self, url: &str, api_version: u32) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: Method::Get,
            path: url.to_string(),
            api_version,
        });
        let checksum = url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .ok_or_else(|| TransportError::Connection(format!("unknown file url {}", url)))?;
        state.files.get(checksum).cloned().ok_or_else(not_found)
    }

    fn store_file(&self, url: &str, api_version: u32, content: Vec<u8>) -> Result<(), TransportError> {
        let checksum = url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .ok_or_else(|| TransportError::Connection(format!("unknown upload url {}", url)))?;
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: Method::Put,
            path: url.to_string(),
            api_version,
        });
        state.files.insert(checksum.to_string(), content);
        Ok(())
    }
}

/// Point every manifest file entry at its stored content.
fn with_file_urls(mut manifest: Value) -> Value {
    if let Some(fields) = manifest.as_object_mut() {
        for entries in fields.values_mut().filter_map(Value::as_array_mut) {
            for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                let url = entry
                    .get("checksum")
                    .and_then(Value::as_str)
                    .map(|checksum| format!("{}{}", UPLOAD_URL_PREFIX, checksum));
                if let Some(url) = url {
                    entry.insert("url".to_string(), Value::String(url));
                }
            }
        }
    }
    manifest
}

fn not_found() -> TransportError {
    TransportError::Http {
        status: 404,
        message: "Not Found".to_string(),
    }
}

/// Client view of a [`MemoryServer`].
pub struct MemoryClient {
    server: Arc<MemoryServer>,
    url: String,
    options: RestOptions,
}

#[async_trait]
impl RestClient for MemoryClient {
    fn url(&self) -> &str {
        &self.url
    }

    fn options(&self) -> &RestOptions {
        &self.options
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        self.server.handle(Method::Get, path, self.api_version(), None)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.server
            .handle(Method::Post, path, self.api_version(), Some(body))
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.server
            .handle(Method::Put, path, self.api_version(), Some(body))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.server.fetch_file(url, self.api_version())
    }

    async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        self.server.store_file(url, self.api_version(), body)
    }
}

/// Connector handing out [`MemoryClient`]s and remembering what it was asked for.
pub struct MemoryConnector {
    server: Arc<MemoryServer>,
    connections: Mutex<Vec<(String, RestOptions)>>,
}

impl MemoryConnector {
    pub fn new(server: Arc<MemoryServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            connections: Mutex::new(Vec::new()),
        })
    }

    /// Every (url, options) pair a client was built for.
    pub fn connections(&self) -> Vec<(String, RestOptions)> {
        self.connections.lock().clone()
    }
}

impl RestConnector for MemoryConnector {
    fn connect(
        &self,
        url: &str,
        options: RestOptions,
    ) -> Result<Arc<dyn RestClient>, TransportError> {
        self.connections
            .lock()
            .push((url.to_string(), options.clone()));
        Ok(Arc::new(MemoryClient {
            server: self.server.clone(),
            url: url.to_string(),
            options,
        }))
    }
}
