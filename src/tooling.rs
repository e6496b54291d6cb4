//! Tooling & Integration Layer
//!
//! Command-line access to the server tree.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
