//! Virtual filesystem nodes.
//!
//! `chef_server` exposes the remote server as a tree rooted at `/`;
//! `repository` exposes cookbooks in a local repository so they can be
//! uploaded into it.

pub mod chef_server;
pub mod repository;

pub use chef_server::{
    CookbookDir, CookbooksDir, RemoteCookbookSource, ServerRoot, UploadOptions,
};
pub use repository::{CookbookSource, RepositoryCookbookDir};
