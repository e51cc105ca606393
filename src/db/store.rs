//! The local store boundary.
//!
//! `ScanStore` is what the capture pipeline and the sync coordinator talk to.
//! `SqliteScanStore` is the embedded-database adapter; it is the only writer
//! of `sync_status`, and all mutation goes through `save` and the sync-status
//! methods.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::OnceCell;

use super::connection::Database;
use super::models::{ScanRecord, StorageStats, SyncMetadata, SyncStatus};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Opens or creates the persistent store. Safe to call repeatedly.
    async fn initialize(&self) -> StoreResult<()>;

    /// Durably writes the record with status `pending` and returns its id.
    /// A record without an id gets a fresh one.
    async fn save(&self, record: ScanRecord) -> StoreResult<String>;

    async fn get(&self, id: &str) -> StoreResult<ScanRecord>;

    /// Pending and failed records that are not abandoned, oldest first.
    async fn list_pending_sync(&self) -> StoreResult<Vec<ScanRecord>>;

    async fn list_recent(&self, limit: u32) -> StoreResult<Vec<ScanRecord>>;

    async fn update_sync_status(&self, id: &str, status: SyncStatus) -> StoreResult<()>;

    /// Moves the record to `failed` and keeps the error for diagnostics.
    /// Returns how many attempts have failed so far.
    async fn record_sync_failure(
        &self,
        id: &str,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<u32>;

    async fn abandon(&self, id: &str) -> StoreResult<bool>;

    async fn sync_metadata(&self, id: &str) -> StoreResult<SyncMetadata>;

    async fn storage_stats(&self) -> StoreResult<StorageStats>;
}

pub struct SqliteScanStore {
    path: PathBuf,
    db: OnceCell<Database>,
}

impl SqliteScanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            db: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn db(&self) -> StoreResult<&Database> {
        self.db.get().ok_or_else(|| {
            StoreError::StorageUnavailable("local store has not been initialized".into())
        })
    }
}

#[async_trait]
impl ScanStore for SqliteScanStore {
    async fn initialize(&self) -> StoreResult<()> {
        let path = self.path.clone();
        self.db
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || Database::open(path))
                    .await
                    .map_err(|err| {
                        StoreError::StorageUnavailable(format!("database open task failed: {err}"))
                    })?
            })
            .await?;
        Ok(())
    }

    async fn save(&self, mut record: ScanRecord) -> StoreResult<String> {
        let db = self.db()?;

        if !record.features_consistent() {
            return Err(StoreError::InvalidRecord(
                "geo features must be present exactly when a depth measurement is".into(),
            ));
        }
        if !record.has_id() {
            record.id = ScanRecord::new_id();
        }
        if record.sanitize_non_finite() {
            warn!("Scan {} carried non-finite values; they were dropped before saving", record.id);
        }

        let inserted = db.insert_scan(&record).await?;
        if inserted {
            info!(
                "Saved scan {} ({} detections) as pending",
                record.id,
                record.detections.len()
            );
        } else {
            info!("Scan {} already stored; save treated as a retry", record.id);
        }
        Ok(record.id)
    }

    async fn get(&self, id: &str) -> StoreResult<ScanRecord> {
        self.db()?.get_scan(id).await
    }

    async fn list_pending_sync(&self) -> StoreResult<Vec<ScanRecord>> {
        self.db()?.list_pending_scans().await
    }

    async fn list_recent(&self, limit: u32) -> StoreResult<Vec<ScanRecord>> {
        self.db()?.list_scans(limit).await
    }

    async fn update_sync_status(&self, id: &str, status: SyncStatus) -> StoreResult<()> {
        let previous = self.db()?.update_sync_status(id, status).await?;
        if previous != status {
            info!("Scan {id} sync status {previous} -> {status}");
        }
        Ok(())
    }

    async fn record_sync_failure(
        &self,
        id: &str,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<u32> {
        self.db()?.record_sync_failure(id, error, attempted_at).await
    }

    async fn abandon(&self, id: &str) -> StoreResult<bool> {
        let abandoned = self.db()?.abandon_scan(id).await?;
        if abandoned {
            info!("Scan {id} abandoned; it will no longer be synced");
        }
        Ok(abandoned)
    }

    async fn sync_metadata(&self, id: &str) -> StoreResult<SyncMetadata> {
        self.db()?.get_sync_metadata(id).await
    }

    async fn storage_stats(&self) -> StoreResult<StorageStats> {
        self.db()?.storage_stats().await
    }
}
