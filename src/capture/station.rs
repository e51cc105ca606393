use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::draft::CaptureDraft;
use crate::analysis::DepthFeatureAnalyzer;
use crate::db::models::{ScanRecord, StorageStats, SyncStatus};
use crate::db::{ScanStore, SqliteScanStore};
use crate::enrichment::{EnrichmentEngine, ReferenceCatalog};
use crate::error::{StoreResult, SyncError};
use crate::settings::{SettingsStore, StationSettings};
use crate::sync::{ConnectivityMonitor, RemoteArchive, SyncController, SyncCoordinator, SyncReport};

/// The host's single entry point: capture, statistics and sync.
///
/// Capture never touches the network. Sync work runs in background tasks
/// owned by the coordinator and the retry loop.
pub struct FieldStation {
    store: Arc<dyn ScanStore>,
    analyzer: DepthFeatureAnalyzer,
    engine: EnrichmentEngine,
    coordinator: Arc<SyncCoordinator>,
    controller: Mutex<SyncController>,
    settings: StationSettings,
}

impl FieldStation {
    pub fn new(
        store: Arc<dyn ScanStore>,
        archive: Arc<dyn RemoteArchive>,
        connectivity: ConnectivityMonitor,
        settings: StationSettings,
    ) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            archive,
            connectivity,
            settings.sync.clone(),
        ));

        Self {
            store,
            analyzer: DepthFeatureAnalyzer::new(settings.analysis.clone()),
            engine: EnrichmentEngine::new(
                Arc::new(ReferenceCatalog::builtin()),
                settings.enrichment.clone(),
            ),
            coordinator,
            controller: Mutex::new(SyncController::new()),
            settings,
        }
    }

    /// Wires a station over `data_dir`: `settings.json` next to the scan
    /// database named in it.
    pub fn open(
        data_dir: &Path,
        archive: Arc<dyn RemoteArchive>,
        connectivity: ConnectivityMonitor,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?.effective();
        let store = Arc::new(SqliteScanStore::new(settings.database_path(data_dir)));

        Ok(Self::new(store, archive, connectivity, settings))
    }

    pub fn settings(&self) -> &StationSettings {
        &self.settings
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Opens the store and starts the periodic retry loop. Idempotent.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.store.initialize().await?;

        let mut controller = self.controller.lock().await;
        if !controller.is_running() {
            if let Err(err) = controller.start(
                Arc::clone(&self.coordinator),
                self.settings.sync.retry_interval(),
            ) {
                warn!("Sync retry loop not started: {err:#}");
            }
        }
        Ok(())
    }

    /// Runs analysis and enrichment. Pure apart from id and timestamp
    /// defaults; the result can be handed to `save` again after a failed
    /// write.
    pub fn prepare(&self, draft: CaptureDraft) -> ScanRecord {
        let geo_features = draft
            .depth_measurement
            .as_ref()
            .map(|measurement| self.analyzer.analyze(measurement));
        let detections = self.engine.enhance_all(&draft.detections);
        let geological_context = self.engine.analyze_context(
            &detections,
            geo_features.as_ref(),
            draft.rock_type,
            draft.weathering_level,
        );

        let mut record = ScanRecord {
            id: draft.id.unwrap_or_else(ScanRecord::new_id),
            captured_at: draft.captured_at.unwrap_or_else(Utc::now),
            location: draft.location,
            image: draft.image,
            depth_measurement: draft.depth_measurement,
            geo_features,
            detections,
            geological_context,
            field_notes: draft.field_notes,
            rock_type: draft.rock_type,
            weathering_level: draft.weathering_level,
            sync_status: SyncStatus::Pending,
        };
        // Analysis already ignores non-finite points; strip them so the
        // prepared record is exactly what the store keeps.
        record.sanitize_non_finite();
        record
    }

    pub async fn capture(&self, draft: CaptureDraft) -> StoreResult<String> {
        let record = self.prepare(draft);
        if record.geological_context.has_advisories() {
            info!(
                "Scan {} saved with {} advisory note(s)",
                record.id,
                record.geological_context.notes.len()
            );
        }
        self.save(record).await
    }

    pub async fn save(&self, record: ScanRecord) -> StoreResult<String> {
        self.store.save(record).await
    }

    pub async fn get(&self, id: &str) -> StoreResult<ScanRecord> {
        self.store.get(id).await
    }

    pub async fn recent_scans(&self, limit: u32) -> StoreResult<Vec<ScanRecord>> {
        self.store.list_recent(limit).await
    }

    pub async fn storage_stats(&self) -> StoreResult<StorageStats> {
        self.store.storage_stats().await
    }

    pub async fn sync_pending(&self) -> Result<SyncReport, SyncError> {
        self.coordinator.sync_pending().await
    }

    pub fn on_connectivity_change(
        &self,
        is_online: bool,
    ) -> Option<JoinHandle<Result<SyncReport, SyncError>>> {
        self.coordinator.on_connectivity_change(is_online)
    }

    /// Stops the retry loop and cancels any running batch.
    pub async fn shutdown(&self) -> Result<()> {
        self.coordinator.cancel_batch();
        self.controller.lock().await.stop().await
    }
}
