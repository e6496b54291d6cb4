//! Error types for the cookbook filesystem.
//!
//! Errors are layered: the transport raises [`TransportError`], the loader
//! raises [`LoadError`], the upload path wraps both in [`UploadError`], and the
//! filesystem nodes surface [`FsError`] to whatever drives the tree.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a REST client talking to the cookbook server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request did not complete within the client's timeout.
    #[error("{message}")]
    Timeout { message: String },

    /// The server answered with a non-2xx status.
    #[error("{status} \"{message}\"")]
    Http { status: u16, message: String },

    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered but the body could not be used.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors raised while loading a cookbook from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cookbook directory not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid cookbook metadata in {path}: {message}")]
    InvalidMetadata { path: PathBuf, message: String },

    #[error("invalid chefignore pattern {pattern:?}: {message}")]
    InvalidIgnorePattern { pattern: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the upload path.
///
/// This is the closed set the collection node classifies; anything that is
/// not a timeout, an HTTP failure, or a frozen cookbook is passed through.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cookbook version is frozen and the upload was not forced.
    #[error("cookbook {cookbook} version {version} is frozen")]
    Frozen { cookbook: String, version: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("staging failed at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

/// Errors surfaced by filesystem nodes.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{operation} failed on {entry}: {message}")]
    OperationFailed {
        operation: Operation,
        entry: String,
        #[source]
        cause: UploadError,
        message: String,
    },

    #[error("{operation} failed on {entry}: {message}")]
    CookbookFrozen {
        operation: Operation,
        entry: String,
        #[source]
        cause: UploadError,
        message: String,
    },

    #[error("{entry} not found")]
    NotFound {
        entry: String,
        #[source]
        cause: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl FsError {
    pub fn is_frozen(&self) -> bool {
        matches!(self, FsError::CookbookFrozen { .. })
    }
}

/// Errors raised while setting up the process: configuration and logging.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
