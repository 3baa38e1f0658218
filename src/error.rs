//! Error types
//!
//! Failures are split by collaborator: the remote repository API, the local
//! content store, and the sync engine that drives both.

use thiserror::Error;

/// Classification of a remote API failure.
///
/// The orchestrator switches on the kind rather than inspecting HTTP details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Credentials were rejected (401/403)
    Authentication,
    /// Repository, branch or object does not exist (404)
    NotFound,
    /// Transport failure or server-side error
    Network,
    /// Anything else, including unexpected payloads
    Other,
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RemoteErrorKind::Authentication => "authentication",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Network => "network",
            RemoteErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// Error returned by a [`crate::remote::RemoteRepository`] implementation.
#[derive(Debug, Clone, Error)]
#[error("remote {kind} error: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Authentication, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Other, message)
    }

    /// Map an HTTP status code onto an error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => RemoteErrorKind::Authentication,
            404 => RemoteErrorKind::NotFound,
            500..=599 => RemoteErrorKind::Network,
            _ => RemoteErrorKind::Other,
        };
        Self::new(kind, message)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return RemoteError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return RemoteError::other(format!("Failed to decode response: {}", err));
        }
        RemoteError::network(err.to_string())
    }
}

/// Error returned by a [`crate::store::LocalStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Path not found in local store: {0}")]
    NotFound(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Local store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not valid UTF-8 text: {0}")]
    NotUtf8(String),
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a sync phase.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to decode content for {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Timed out after {waited_ms}ms waiting for branch to report commit {expected}")]
    RefPropagationTimeout { expected: String, waited_ms: u64 },

    #[error("Sync state file {path}: {message}")]
    StateFile { path: String, message: String },

    /// A run that ended without success; carries the run's status lines
    #[error("{0}")]
    Aborted(String),
}

impl SyncError {
    /// The remote error kind, when the failure came from the remote API.
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            SyncError::Remote(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}
