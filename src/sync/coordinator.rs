use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::models::{ScanRecord, SyncStatus};
use crate::db::ScanStore;
use crate::error::{SyncError, UploadError};

use super::archive::RemoteArchive;
use super::config::SyncConfig;
use super::connectivity::ConnectivityMonitor;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Uploads that actually started.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records left pending because the batch was cancelled.
    pub cancelled: usize,
    /// The pass was a no-op because the device was offline.
    pub skipped_offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadOutcome {
    Synced,
    Failed,
    /// Cancelled before the upload started.
    Skipped,
    /// Cancelled while the upload was in flight.
    Interrupted,
}

/// Drives pending records to `synced` through the remote archive.
///
/// Passes are serialized, so two passes never upload the same record at
/// once. Within a pass uploads start oldest first with bounded fan-out.
pub struct SyncCoordinator {
    store: Arc<dyn ScanStore>,
    archive: Arc<dyn RemoteArchive>,
    connectivity: ConnectivityMonitor,
    config: SyncConfig,
    pass_lock: Mutex<()>,
    batch_token: StdMutex<CancellationToken>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn ScanStore>,
        archive: Arc<dyn RemoteArchive>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            archive,
            connectivity,
            config,
            pass_lock: Mutex::new(()),
            batch_token: StdMutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Edge-triggered. Going online schedules a background pass and returns
    /// its handle; going offline cancels the running batch. Repeating the
    /// current state does nothing.
    pub fn on_connectivity_change(
        self: &Arc<Self>,
        is_online: bool,
    ) -> Option<JoinHandle<Result<SyncReport, SyncError>>> {
        if !self.connectivity.set_online(is_online) {
            return None;
        }

        if is_online {
            log_info!("Connectivity restored; scheduling sync pass");
            let coordinator = Arc::clone(self);
            Some(tokio::spawn(async move { coordinator.sync_pending().await }))
        } else {
            log_info!("Connectivity lost; cancelling in-flight sync batch");
            self.cancel_batch();
            None
        }
    }

    /// Cancels the current batch. Acknowledged uploads keep `synced`;
    /// everything else stays in the pending set.
    pub fn cancel_batch(&self) {
        let mut guard = match self.batch_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.cancel();
        *guard = CancellationToken::new();
    }

    fn current_batch_token(&self) -> CancellationToken {
        match self.batch_token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drains the pending set once. Offline is a no-op report, not an error.
    pub async fn sync_pending(&self) -> Result<SyncReport, SyncError> {
        let _pass = self.pass_lock.lock().await;
        // Taken before the online check so an offline edge racing this pass
        // always lands on the token the pass is using.
        let token = self.current_batch_token();

        if !self.connectivity.is_online() {
            log_info!("Offline; sync pass skipped");
            return Ok(SyncReport {
                skipped_offline: true,
                ..SyncReport::default()
            });
        }

        let pending = self.store.list_pending_sync().await?;
        if pending.is_empty() {
            return Ok(SyncReport::default());
        }

        log_info!(
            "Sync pass starting: {} pending record(s), up to {} concurrent upload(s)",
            pending.len(),
            self.config.concurrency()
        );

        let outcomes: Vec<UploadOutcome> = stream::iter(pending)
            .map(|record| self.sync_record(record, &token))
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;

        let mut report = SyncReport::default();
        for outcome in outcomes {
            match outcome {
                UploadOutcome::Synced => {
                    report.attempted += 1;
                    report.succeeded += 1;
                }
                UploadOutcome::Failed => {
                    report.attempted += 1;
                    report.failed += 1;
                }
                UploadOutcome::Interrupted => {
                    report.attempted += 1;
                    report.cancelled += 1;
                }
                UploadOutcome::Skipped => report.cancelled += 1,
            }
        }

        log_info!(
            "Sync pass finished: attempted={} succeeded={} failed={} cancelled={}",
            report.attempted,
            report.succeeded,
            report.failed,
            report.cancelled
        );
        Ok(report)
    }

    async fn sync_record(&self, record: ScanRecord, token: &CancellationToken) -> UploadOutcome {
        if token.is_cancelled() || !self.connectivity.is_online() {
            return UploadOutcome::Skipped;
        }

        if record.sync_status == SyncStatus::Failed {
            if let Err(err) = self
                .store
                .update_sync_status(&record.id, SyncStatus::Pending)
                .await
            {
                log_error!("Could not requeue scan {} for retry: {err}", record.id);
                return UploadOutcome::Failed;
            }
        }

        let timeout = self.config.upload_timeout();
        let upload = tokio::time::timeout(timeout, self.archive.upload(&record));
        // Upload first: an ack that is ready in the same poll as the
        // cancellation is still committed.
        let result = tokio::select! {
            biased;
            result = upload => match result {
                Ok(result) => result,
                Err(_) => Err(UploadError::Timeout(timeout)),
            },
            _ = token.cancelled() => {
                log_info!("Upload of scan {} interrupted; it stays pending", record.id);
                return UploadOutcome::Interrupted;
            }
        };

        match result {
            Ok(ack) => {
                if ack.duplicate {
                    log_info!("Archive already held scan {}", ack.id);
                }
                match self
                    .store
                    .update_sync_status(&record.id, SyncStatus::Synced)
                    .await
                {
                    Ok(()) => UploadOutcome::Synced,
                    Err(err) => {
                        // The archive has it; a later pass re-uploads and the
                        // archive de-duplicates by id.
                        log_error!("Scan {} acknowledged but not marked synced: {err}", record.id);
                        UploadOutcome::Failed
                    }
                }
            }
            Err(err) => {
                self.handle_failure(&record.id, &err).await;
                UploadOutcome::Failed
            }
        }
    }

    async fn handle_failure(&self, id: &str, err: &UploadError) {
        match err {
            UploadError::Timeout(after) => log_warn!("Upload of scan {id} timed out after {after:?}"),
            other => log_warn!("Upload of scan {id} failed: {other}"),
        }

        let attempts = match self
            .store
            .record_sync_failure(id, &err.to_string(), Utc::now())
            .await
        {
            Ok(attempts) => attempts,
            Err(store_err) => {
                log_error!("Could not record sync failure for scan {id}: {store_err}");
                return;
            }
        };

        if let Some(max_attempts) = self.config.max_attempts {
            if attempts >= max_attempts {
                match self.store.abandon(id).await {
                    Ok(_) => log_warn!("Scan {id} abandoned after {attempts} failed attempt(s)"),
                    Err(store_err) => log_error!("Could not abandon scan {id}: {store_err}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::db::models::{GeologicalContext, RockType, WeatheringLevel};
    use crate::db::SqliteScanStore;
    use crate::sync::archive::ArchiveAck;

    #[derive(Default)]
    struct ScriptedArchive {
        calls: AtomicUsize,
        failures: StdMutex<HashMap<String, UploadError>>,
        delay: Option<Duration>,
        /// Per-id delays that override `delay`.
        slow: HashMap<String, Duration>,
        /// Uploads block until this token fires, then succeed.
        gate: Option<CancellationToken>,
    }

    impl ScriptedArchive {
        fn failing(id: &str, err: UploadError) -> Self {
            let archive = Self::default();
            archive
                .failures
                .lock()
                .unwrap()
                .insert(id.to_string(), err);
            archive
        }
    }

    #[async_trait]
    impl RemoteArchive for ScriptedArchive {
        async fn upload(&self, record: &ScanRecord) -> Result<ArchiveAck, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.slow.get(&record.id).copied().or(self.delay) {
                tokio::time::sleep(delay).await;
            }
            if let Some(gate) = &self.gate {
                gate.cancelled().await;
            }
            if let Some(err) = self.failures.lock().unwrap().get(&record.id) {
                return Err(err.clone());
            }
            Ok(ArchiveAck {
                id: record.id.clone(),
                received_at: Utc::now(),
                duplicate: false,
            })
        }
    }

    fn record(n: i64) -> ScanRecord {
        ScanRecord {
            id: format!("scan-{n}"),
            captured_at: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            location: None,
            image: None,
            depth_measurement: None,
            geo_features: None,
            detections: Vec::new(),
            geological_context: GeologicalContext::default(),
            field_notes: None,
            rock_type: RockType::Unknown,
            weathering_level: WeatheringLevel::Moderate,
            sync_status: SyncStatus::Pending,
        }
    }

    async fn store_with(dir: &tempfile::TempDir, count: i64) -> Arc<SqliteScanStore> {
        let store = Arc::new(SqliteScanStore::new(dir.path().join("scans.sqlite3")));
        store.initialize().await.unwrap();
        for n in 0..count {
            store.save(record(n)).await.unwrap();
        }
        store
    }

    fn coordinator(
        store: Arc<SqliteScanStore>,
        archive: Arc<ScriptedArchive>,
        online: bool,
        config: SyncConfig,
    ) -> Arc<SyncCoordinator> {
        Arc::new(SyncCoordinator::new(
            store,
            archive,
            ConnectivityMonitor::new(online),
            config,
        ))
    }

    #[tokio::test]
    async fn offline_pass_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 2).await;
        let archive = Arc::new(ScriptedArchive::default());
        let sync = coordinator(store.clone(), archive.clone(), false, SyncConfig::default());

        let report = sync.sync_pending().await.unwrap();
        assert!(report.skipped_offline);
        assert_eq!(report.attempted, 0);
        assert_eq!(archive.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.list_pending_sync().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn drains_and_then_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 3).await;
        let archive = Arc::new(ScriptedArchive::default());
        let sync = coordinator(store.clone(), archive.clone(), true, SyncConfig::default());

        let first = sync.sync_pending().await.unwrap();
        assert_eq!(first.attempted, 3);
        assert_eq!(first.succeeded, 3);

        let second = sync.sync_pending().await.unwrap();
        assert_eq!(second, SyncReport::default());
        assert_eq!(archive.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_recorded_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 2).await;
        let archive = Arc::new(ScriptedArchive::failing(
            "scan-1",
            UploadError::Failed("502 bad gateway".into()),
        ));
        let sync = coordinator(store.clone(), archive.clone(), true, SyncConfig::default());

        let report = sync.sync_pending().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let failed = store.get("scan-1").await.unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Failed);
        let meta = store.sync_metadata("scan-1").await.unwrap();
        assert_eq!(meta.attempts, 1);
        assert!(meta.last_error.unwrap().contains("502"));

        archive.failures.lock().unwrap().clear();
        let retry = sync.sync_pending().await.unwrap();
        assert_eq!(retry.succeeded, 1);
        assert_eq!(
            store.get("scan-1").await.unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[tokio::test]
    async fn exhausted_records_are_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 1).await;
        let archive = Arc::new(ScriptedArchive::failing(
            "scan-0",
            UploadError::Rejected("schema".into()),
        ));
        let config = SyncConfig {
            max_attempts: Some(2),
            ..SyncConfig::default()
        };
        let sync = coordinator(store.clone(), archive.clone(), true, config);

        sync.sync_pending().await.unwrap();
        assert_eq!(store.list_pending_sync().await.unwrap().len(), 1);
        sync.sync_pending().await.unwrap();
        assert!(store.list_pending_sync().await.unwrap().is_empty());

        let stats = store.storage_stats().await.unwrap();
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.pending_sync, 0);
    }

    #[tokio::test]
    async fn slow_uploads_time_out_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 1).await;
        let archive = Arc::new(ScriptedArchive {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedArchive::default()
        });
        let config = SyncConfig {
            upload_timeout_secs: 1,
            ..SyncConfig::default()
        };
        let sync = coordinator(store.clone(), archive, true, config);

        let report = sync.sync_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        let meta = store.sync_metadata("scan-0").await.unwrap();
        assert_eq!(meta.status, SyncStatus::Failed);
        assert!(meta.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn going_offline_cancels_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 3).await;
        let archive = Arc::new(ScriptedArchive {
            delay: Some(Duration::from_secs(10)),
            ..ScriptedArchive::default()
        });
        let sync = coordinator(store.clone(), archive.clone(), false, SyncConfig::default());

        let handle = sync.on_connectivity_change(true).expect("online edge schedules a pass");
        while archive.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(sync.on_connectivity_change(false).is_none());

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.cancelled, 3);
        assert_eq!(store.list_pending_sync().await.unwrap().len(), 3);
        for n in 0..3 {
            let meta = store.sync_metadata(&format!("scan-{n}")).await.unwrap();
            assert_eq!(meta.status, SyncStatus::Pending);
            assert_eq!(meta.attempts, 0);
        }
    }

    #[tokio::test]
    async fn acknowledged_uploads_commit_when_connectivity_drops() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 3).await;
        let archive = Arc::new(ScriptedArchive {
            slow: HashMap::from([("scan-2".to_string(), Duration::from_secs(10))]),
            ..ScriptedArchive::default()
        });
        let config = SyncConfig {
            max_concurrent_uploads: 3,
            ..SyncConfig::default()
        };
        let sync = coordinator(store.clone(), archive.clone(), false, config);

        let handle = sync.on_connectivity_change(true).expect("online edge schedules a pass");
        while store.storage_stats().await.unwrap().synced < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(archive.calls.load(Ordering::SeqCst), 3);
        assert!(sync.on_connectivity_change(false).is_none());

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.failed, 0);

        for id in ["scan-0", "scan-1"] {
            assert_eq!(store.get(id).await.unwrap().sync_status, SyncStatus::Synced);
        }
        let meta = store.sync_metadata("scan-2").await.unwrap();
        assert_eq!(meta.status, SyncStatus::Pending);
        assert_eq!(meta.attempts, 0);
        assert_eq!(store.list_pending_sync().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ack_ready_with_cancellation_is_committed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 1).await;
        let token = CancellationToken::new();
        let archive = Arc::new(ScriptedArchive {
            gate: Some(token.clone()),
            ..ScriptedArchive::default()
        });
        let sync = coordinator(store.clone(), archive.clone(), true, SyncConfig::default());
        let record = store.get("scan-0").await.unwrap();

        // The ack and the cancellation become ready on the same wake-up.
        let (outcome, ()) = tokio::join!(sync.sync_record(record, &token), async {
            while archive.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            token.cancel();
        });

        assert_eq!(outcome, UploadOutcome::Synced);
        assert_eq!(
            store.get("scan-0").await.unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[tokio::test]
    async fn repeated_state_is_not_an_edge() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 0).await;
        let sync = coordinator(store, Arc::new(ScriptedArchive::default()), true, SyncConfig::default());
        assert!(sync.on_connectivity_change(true).is_none());
    }
}
