use std::time::Duration;

use thiserror::Error;

use crate::db::models::SyncStatus;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The platform refused access to the backing store. Capture is blocked
    /// until `initialize` succeeds again.
    #[error("Storage Unavailable: {0}")]
    StorageUnavailable(String),

    /// The write was not committed. The caller still owns the in-memory record.
    #[error("Write Failed: {0}")]
    WriteFailed(String),

    #[error("Scan record not found: {0}")]
    NotFound(String),

    #[error("Invalid sync transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: SyncStatus,
        to: SyncStatus,
    },

    #[error("Invalid Record: {0}")]
    InvalidRecord(String),

    #[error("Corrupt Record: {0}")]
    Corrupt(String),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Only an unavailable store is surfaced to the user; everything else is
    /// absorbed into record state or retried.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UploadError {
    #[error("Upload Failed: {0}")]
    Failed(String),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upload Rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
