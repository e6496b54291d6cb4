//! `/cookbooks`: the cookbook collection on the server.
//!
//! Example children:
//!   apache2/
//!   mysql/
//!
//! Children are fetched lazily from the server listing and cached until a
//! cookbook is created through this node. Creating a child uploads the source
//! cookbook and translates upload failures into filesystem errors.

use crate::config::cookbook_path;
use crate::cookbook::{CookbookUploader, CookbookVersion, CookbookVersionLoader};
use crate::error::{FsError, Operation, TransportError, UploadError};
use crate::fs::chef_server::{CookbookDir, RemoteCookbookSource, ServerRoot};
use crate::fs::repository::CookbookSource;
use crate::rest::{RestClient, RestOptions, VersionClass};
use crate::staging::StagingArea;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Flags for creating a cookbook on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Mark the uploaded version immutable.
    pub freeze: bool,
    /// Overwrite a frozen version.
    pub force: bool,
}

#[derive(Debug)]
enum CacheState {
    Unfetched,
    Fetched(Arc<Vec<CookbookDir>>),
}

/// Memoized listing. `generation` moves on every invalidation so a listing
/// that was in flight across an invalidation is not stored.
#[derive(Debug)]
struct ChildrenCache {
    state: CacheState,
    generation: u64,
}

impl ChildrenCache {
    fn invalidate(&mut self) {
        self.state = CacheState::Unfetched;
        self.generation += 1;
    }
}

/// How an upload failure is reported.
enum UploadFailure {
    Timeout,
    HttpError,
    Frozen,
    Unclassified,
}

fn classify(err: &UploadError) -> UploadFailure {
    match err {
        UploadError::Transport(TransportError::Timeout { .. }) => UploadFailure::Timeout,
        UploadError::Transport(TransportError::Http { status: 409, .. }) => UploadFailure::Frozen,
        UploadError::Transport(TransportError::Http { .. }) => UploadFailure::HttpError,
        UploadError::Frozen { .. } => UploadFailure::Frozen,
        UploadError::Transport(TransportError::Connection(_))
        | UploadError::Transport(TransportError::InvalidResponse(_))
        | UploadError::Load(_)
        | UploadError::Staging { .. } => UploadFailure::Unclassified,
    }
}

pub struct CookbooksDir {
    parent: Arc<ServerRoot>,
    children: Mutex<ChildrenCache>,
}

impl CookbooksDir {
    pub const NAME: &'static str = "cookbooks";

    pub fn new(parent: Arc<ServerRoot>) -> Self {
        Self {
            parent,
            children: Mutex::new(ChildrenCache {
                state: CacheState::Unfetched,
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        Self::NAME
    }

    pub fn parent(&self) -> &Arc<ServerRoot> {
        &self.parent
    }

    pub fn path(&self) -> String {
        format!("{}{}", self.parent.path(), Self::NAME)
    }

    /// Path of the collection relative to the server base URL.
    pub fn api_path(&self) -> &str {
        Self::NAME
    }

    /// Whether a listing is currently cached.
    pub fn is_cached(&self) -> bool {
        matches!(self.children.lock().state, CacheState::Fetched(_))
    }

    /// Cookbooks on the server, sorted by name.
    ///
    /// The first call lists the collection; later calls return the same
    /// cached sequence until a child is created through this node.
    pub async fn children(&self) -> Result<Arc<Vec<CookbookDir>>, FsError> {
        let generation = {
            let cache = self.children.lock();
            if let CacheState::Fetched(children) = &cache.state {
                return Ok(children.clone());
            }
            cache.generation
        };

        debug!(path = %self.path(), "Listing cookbooks");
        let listing = self
            .parent
            .get_json(self.api_path())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    FsError::NotFound {
                        entry: self.path(),
                        cause: e,
                    }
                } else {
                    FsError::Transport(e)
                }
            })?;
        let names = listing.as_object().ok_or_else(|| {
            TransportError::InvalidResponse(format!(
                "expected an object listing {}, got {}",
                self.api_path(),
                listing
            ))
        })?;

        let parent_path = self.path();
        let mut children: Vec<CookbookDir> = names
            .keys()
            .map(|name| CookbookDir::new(name.as_str(), parent_path.as_str(), true))
            .collect();
        children.sort_by(|a, b| a.name().cmp(b.name()));
        children.dedup_by(|a, b| a.name() == b.name());
        let children = Arc::new(children);

        let mut cache = self.children.lock();
        if cache.generation == generation {
            cache.state = CacheState::Fetched(children.clone());
        }
        Ok(children)
    }

    /// The cached entry named `name`, or a new entry that is not known to
    /// exist. Never lists the collection.
    pub fn make_child_entry(&self, name: &str) -> CookbookDir {
        let cache = self.children.lock();
        if let CacheState::Fetched(children) = &cache.state {
            if let Ok(index) = children.binary_search_by(|child| child.name().cmp(name)) {
                return children[index].clone();
            }
        }
        CookbookDir::new(name, self.path(), false)
    }

    /// Only directories (cookbooks) can live here.
    pub fn can_have_child(&self, _name: &str, is_dir: bool) -> bool {
        is_dir
    }

    /// Forget the cached listing.
    pub fn invalidate_children(&self) {
        self.children.lock().invalidate();
    }

    /// Create (upload) a cookbook from `other`.
    ///
    /// The cached listing is dropped both before the upload starts and after
    /// it finishes, whatever the upload's outcome. A listing taken while the
    /// upload was in flight is therefore never served afterwards.
    pub async fn create_child_from(
        &self,
        other: &dyn CookbookSource,
        options: &UploadOptions,
    ) -> Result<(), FsError> {
        self.invalidate_children();
        let result = self.upload_cookbook_from(other, options).await;
        self.invalidate_children();
        result
    }

    /// Upload `other`, reporting timeouts, HTTP failures, and frozen
    /// cookbooks as write errors on this node.
    pub async fn upload_cookbook_from(
        &self,
        other: &dyn CookbookSource,
        options: &UploadOptions,
    ) -> Result<(), FsError> {
        self.upload_cookbook(other, options)
            .await
            .map_err(|err| self.translate_upload_error(other.name(), err))
    }

    fn translate_upload_error(&self, cookbook: &str, err: UploadError) -> FsError {
        let entry = self.path();
        match classify(&err) {
            UploadFailure::Timeout => FsError::OperationFailed {
                operation: Operation::Write,
                entry,
                message: format!("Timeout writing: {}", err),
                cause: err,
            },
            UploadFailure::HttpError => FsError::OperationFailed {
                operation: Operation::Write,
                entry,
                message: format!("HTTP error writing: {}", err),
                cause: err,
            },
            UploadFailure::Frozen => FsError::CookbookFrozen {
                operation: Operation::Write,
                entry,
                message: format!("Cookbook {} is frozen", cookbook),
                cause: err,
            },
            UploadFailure::Unclassified => FsError::Upload(err),
        }
    }

    /// Stage and upload `other`.
    ///
    /// When the source compiles metadata into its root, the generated file is
    /// deleted again before this returns, on every path.
    pub async fn upload_cookbook(
        &self,
        other: &dyn CookbookSource,
        options: &UploadOptions,
    ) -> Result<(), UploadError> {
        let upload = self.parent.upload_config();
        let cookbook = other.chef_object()?;
        let mut staging = StagingArea::new(upload.staging, upload.staging_dir.as_deref())?;

        let compiled_metadata = cookbook.compile_metadata()?;
        if let Some(path) = &compiled_metadata {
            staging.remove_on_drop(path.clone());
        }

        let result = self
            .stage_and_upload(other, cookbook, compiled_metadata.is_some(), &staging, options)
            .await;
        drop(staging);
        result
    }

    async fn stage_and_upload(
        &self,
        other: &dyn CookbookSource,
        cookbook: CookbookVersion,
        compiled_metadata: bool,
        staging: &StagingArea,
        options: &UploadOptions,
    ) -> Result<(), UploadError> {
        let mut cookbook_to_upload =
            proxy_cookbook(other.name(), cookbook, compiled_metadata, staging)?;

        if options.freeze {
            cookbook_to_upload.freeze_version();
        }

        let repo_path = other.parent_file_path().to_path_buf();
        info!(
            cookbook = %other.name(),
            version = %cookbook_to_upload.version(),
            freeze = options.freeze,
            force = options.force,
            "Uploading cookbook"
        );
        let uploader = CookbookUploader::new(cookbook_to_upload, options.force, self.chef_rest()?)
            .with_repo_path(&repo_path);

        let result =
            cookbook_path::with_actual_cookbooks_dir(&repo_path, || uploader.upload_cookbooks())
                .await;
        if let Err(e) = &result {
            warn!(cookbook = %other.name(), error = %e, "Cookbook upload failed");
        }
        result
    }

    /// Download version `version` of the child `name` so it can be created
    /// under another collection.
    pub async fn fetch_child(
        &self,
        name: &str,
        version: &str,
    ) -> Result<RemoteCookbookSource, FsError> {
        let entry = self.make_child_entry(name);
        let rest = self.chef_rest()?;
        RemoteCookbookSource::fetch(
            rest.as_ref(),
            &entry.path(),
            name,
            version,
            self.parent.upload_config().staging_dir.as_deref(),
        )
        .await
    }

    /// Client for the root URL that understands cookbook manifest versions.
    pub fn chef_rest(&self) -> Result<Arc<dyn RestClient>, TransportError> {
        self.parent.chef_rest_with(
            &RestOptions::default().with_version_class(VersionClass::ManifestVersions),
        )
    }
}

/// The cookbook as the uploader should see it. A cookbook whose metadata was
/// just compiled is reloaded through a staged alias named after it; any
/// other cookbook is used as loaded.
fn proxy_cookbook(
    name: &str,
    cookbook: CookbookVersion,
    compiled_metadata: bool,
    staging: &StagingArea,
) -> Result<CookbookVersion, UploadError> {
    if !compiled_metadata {
        return Ok(cookbook);
    }
    let proxy_cookbook_path = staging.stage(name, cookbook.root_dir())?;
    drop(cookbook);
    Ok(CookbookVersionLoader::new(proxy_cookbook_path).load()?)
}
