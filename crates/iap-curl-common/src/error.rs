//! Error types for the credential store and resolver.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing the host credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while touching the store file or its directory.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The store file is not valid JSON or has the wrong shape.
    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        /// Store file that failed to parse.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization of the in-memory store failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The per-user configuration directory could not be determined.
    #[error("Failed to determine config directory")]
    NoConfigDir,

    /// A profile URL without a usable host.
    #[error("{0}: not a URL with a host")]
    InvalidUrl(String),

    /// A profile for the same host already exists.
    #[error("{0}: host already registered in config file")]
    AlreadyRegistered(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised when a slot stays empty after every precedence layer.
///
/// The messages name the environment variable, which doubles as the field
/// name in the store file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No credential file path from the environment or the matched profile.
    #[error("GOOGLE_APPLICATION_CREDENTIALS is missing")]
    MissingCredential,

    /// No audience (OAuth client) ID from the environment or the matched profile.
    #[error("IAP_CLIENT_ID is missing")]
    MissingClientId,

    /// An override variable is set but isn't valid UTF-8.
    #[error("{0} is set but is not valid UTF-8")]
    NonUnicodeOverride(String),
}
