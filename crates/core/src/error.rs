//! Error types for jam
//!
//! One error enum is shared by the core, the S3 adapter and the CLI. The sync
//! specific variants carry enough context (path, key, bucket) to be reported
//! on their own.

use std::path::PathBuf;

/// Result alias used throughout jam
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by jam
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A local file or directory could not be opened or read
    #[error("Failed to read {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote object listing could not be loaded
    #[error("Bucket '{bucket}' is unavailable: {source}")]
    RemoteUnavailable {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    /// A single object failed to upload
    #[error("Failed to upload {} to '{key}': {source}", path.display())]
    Upload {
        path: PathBuf,
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// A single object failed to delete
    #[error("Failed to delete '{key}': {source}")]
    Delete {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No S3 website endpoint known for region '{0}'")]
    UnsupportedRegion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap a local I/O failure with the path it happened on
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// The innermost transport error, skipping the sync context wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::RemoteUnavailable { source, .. }
            | Error::Upload { source, .. }
            | Error::Delete { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Process exit code for this error
    ///
    /// Follows the CLI convention: 1 general, 2 usage, 3 network, 4 auth,
    /// 5 not found.
    pub fn exit_code(&self) -> i32 {
        match self.root_cause() {
            Error::Network(_) => 3,
            Error::Auth(_) => 4,
            Error::NotFound(_) => 5,
            Error::Config(_) | Error::LocalIo { .. } => 2,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
