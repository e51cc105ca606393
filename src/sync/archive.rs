use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::ScanRecord;
use crate::error::UploadError;

/// Receipt from the remote archive. A record counts as synced only once one
/// of these has come back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveAck {
    pub id: String,
    pub received_at: DateTime<Utc>,
    /// The archive already held this id and kept its existing copy.
    pub duplicate: bool,
}

/// Remote side of synchronization. Implementations must accept a re-upload
/// of an id they already hold without creating a second copy.
#[async_trait]
pub trait RemoteArchive: Send + Sync {
    async fn upload(&self, record: &ScanRecord) -> Result<ArchiveAck, UploadError>;
}
