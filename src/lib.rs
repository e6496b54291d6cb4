//! Cookbook FS: a cookbook server as a filesystem tree
//!
//! Presents the cookbook collection of a remote server as a directory of
//! cookbook entries, so sync and diff tooling can list remote cookbooks and
//! create them (upload) the same way it handles a local repository.

pub mod config;
pub mod cookbook;
pub mod error;
pub mod fs;
pub mod logging;
pub mod rest;
pub mod staging;
pub mod tooling;
