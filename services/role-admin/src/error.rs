//! Errors and process exit codes

use rolegate_roles::{ConfigStoreError, SyncError};

/// Why a role-admin run stopped before producing a report
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Either --connection-string or --endpoint must be provided")]
    MissingStore,

    #[error("Could not connect to the role store: {0}")]
    Connection(#[source] ConfigStoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl AdminError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingStore => 1,
            Self::Sync(SyncError::FileNotFound(_)) => 2,
            Self::Sync(SyncError::InvalidJson { .. }) => 3,
            Self::Connection(_) | Self::Sync(SyncError::Store(_)) => 4,
            Self::Sync(SyncError::Io { .. }) => 10,
        }
    }
}
