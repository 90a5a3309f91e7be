//! Role resolution errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a configuration store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigStoreError {
    /// Transport failure (DNS, connect, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Credentials missing, expired or rejected
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    /// Credentials valid but not allowed to access the key
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Store throttled the request or returned a server error
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success response
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Response body could not be decoded
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// Client misconfiguration (bad endpoint, bad connection string)
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ConfigStoreError {
    /// Returns true if retrying the same request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }

    /// Short label used for logs and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Unavailable(_) => "unavailable",
            Self::Rejected { .. } => "rejected",
            Self::Decode(_) => "decode",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether this error means the client could not connect or authenticate at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Unauthenticated(_) | Self::Configuration(_)
        )
    }
}

/// A role value that is not a JSON array of strings
#[derive(Error, Debug)]
#[error("malformed role value under {key}: {source}")]
pub struct RoleParseError {
    /// Store key the value was read from
    pub key: String,
    #[source]
    pub source: serde_json::Error,
}

/// Failure while looking up a principal's roles
#[derive(Error, Debug)]
pub enum RoleLookupError {
    #[error(transparent)]
    Store(#[from] ConfigStoreError),

    #[error(transparent)]
    Parse(#[from] RoleParseError),
}

impl RoleLookupError {
    /// Short label used for logs and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Store(err) => err.error_code(),
            Self::Parse(_) => "malformed_value",
        }
    }
}

/// Errors from loading or applying a role file
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("role file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read role file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in role file {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("role store error: {0}")]
    Store(#[from] ConfigStoreError),
}
