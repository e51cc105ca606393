use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fieldscan_lib::{
    ArchiveAck, CaptureDraft, ConnectivityMonitor, DepthMeasurement, DepthPoint, FieldStation,
    RemoteArchive, RockType, ScanRecord, ScanStore, SqliteScanStore, StationSettings, SyncStatus,
    UploadError, WeatheringLevel,
};

/// In-memory archive that de-duplicates by id, like the real one must.
#[derive(Default)]
struct MemoryArchive {
    received: Mutex<HashMap<String, ScanRecord>>,
    uploads: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl MemoryArchive {
    fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn stored(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteArchive for MemoryArchive {
    async fn upload(&self, record: &ScanRecord) -> Result<ArchiveAck, UploadError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&record.id) {
            return Err(UploadError::Failed("archive unavailable".into()));
        }
        let mut received = self.received.lock().unwrap();
        let duplicate = received.contains_key(&record.id);
        received
            .entry(record.id.clone())
            .or_insert_with(|| record.clone());
        Ok(ArchiveAck {
            id: record.id.clone(),
            received_at: Utc::now(),
            duplicate,
        })
    }
}

async fn open_station(dir: &tempfile::TempDir, archive: Arc<MemoryArchive>) -> FieldStation {
    let store = Arc::new(SqliteScanStore::new(dir.path().join("scans.sqlite3")));
    let station = FieldStation::new(
        store,
        archive,
        ConnectivityMonitor::new(false),
        StationSettings::default(),
    );
    station.initialize().await.unwrap();
    station
}

fn draft(n: usize) -> CaptureDraft {
    let points = (0..25)
        .map(|i| DepthPoint::new((i % 5) as f64 * 0.01, (i / 5) as f64 * 0.01, 0.0005 * n as f64))
        .collect();
    CaptureDraft::new()
        .with_location(-33.86 + n as f64 * 0.001, 151.2, None)
        .with_measurement(DepthMeasurement::from_points(points, 0.0016))
        .with_detection("Calcite", 0.8)
        .with_notes(format!("sample {n}"))
        .with_rock(RockType::Sedimentary, WeatheringLevel::Slight)
}

#[tokio::test]
async fn offline_captures_drain_when_connectivity_returns() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive::default());
    let station = open_station(&dir, archive.clone()).await;

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(station.capture(draft(n)).await.unwrap());
    }

    let offline = station.sync_pending().await.unwrap();
    assert!(offline.skipped_offline);
    assert_eq!(archive.upload_count(), 0);

    let stats = station.storage_stats().await.unwrap();
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.pending_sync, 3);

    let report = station
        .on_connectivity_change(true)
        .expect("online edge schedules a pass")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 3);

    let stats = station.storage_stats().await.unwrap();
    assert_eq!(stats.pending_sync, 0);
    assert_eq!(stats.synced, 3);
    for id in &ids {
        assert_eq!(station.get(id).await.unwrap().sync_status, SyncStatus::Synced);
    }
    assert_eq!(archive.stored(), 3);

    let again = station.sync_pending().await.unwrap();
    assert_eq!(again.attempted, 0);
    assert_eq!(archive.upload_count(), 3);

    station.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_upload_stays_in_pending_set_until_it_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive::default());
    let station = open_station(&dir, archive.clone()).await;

    let keep = station.capture(draft(0)).await.unwrap();
    let flaky = station.capture(draft(1)).await.unwrap();
    archive.fail(&flaky);

    station.on_connectivity_change(true).unwrap().await.unwrap().unwrap();

    assert_eq!(station.get(&keep).await.unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(station.get(&flaky).await.unwrap().sync_status, SyncStatus::Failed);
    assert_eq!(station.storage_stats().await.unwrap().pending_sync, 1);

    archive.heal();
    let report = station.sync_pending().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(station.get(&flaky).await.unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(station.storage_stats().await.unwrap().pending_sync, 0);

    station.shutdown().await.unwrap();
}

#[tokio::test]
async fn capture_is_unaffected_by_a_running_sync() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive {
        delay: Some(Duration::from_millis(200)),
        ..MemoryArchive::default()
    });
    let station = open_station(&dir, archive.clone()).await;
    station.capture(draft(0)).await.unwrap();

    let pass = station.on_connectivity_change(true).unwrap();
    let late = station.capture(draft(1)).await.unwrap();
    assert_eq!(station.get(&late).await.unwrap().sync_status, SyncStatus::Pending);

    pass.await.unwrap().unwrap();
    station.sync_pending().await.unwrap();
    assert_eq!(station.storage_stats().await.unwrap().pending_sync, 0);
    assert_eq!(archive.stored(), 2);

    station.shutdown().await.unwrap();
}

#[tokio::test]
async fn saved_record_round_trips_through_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive::default());

    let (id, prepared) = {
        let station = open_station(&dir, archive.clone()).await;
        let prepared = station.prepare(draft(7));
        let id = station.save(prepared.clone()).await.unwrap();
        station.shutdown().await.unwrap();
        (id, prepared)
    };

    let store = SqliteScanStore::new(dir.path().join("scans.sqlite3"));
    store.initialize().await.unwrap();
    let stored = store.get(&id).await.unwrap();
    assert_eq!(stored, prepared);
    assert_eq!(stored.sync_status, SyncStatus::Pending);
}

#[tokio::test]
async fn connectivity_drop_leaves_unacknowledged_records_pending() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive {
        delay: Some(Duration::from_secs(10)),
        ..MemoryArchive::default()
    });
    let station = open_station(&dir, archive.clone()).await;
    for n in 0..4 {
        station.capture(draft(n)).await.unwrap();
    }

    let pass = station.on_connectivity_change(true).unwrap();
    while archive.upload_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(station.on_connectivity_change(false).is_none());

    let report = pass.await.unwrap().unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.cancelled, 4);

    let stats = station.storage_stats().await.unwrap();
    assert_eq!(stats.pending_sync, 4);
    assert_eq!(stats.failed, 0);

    station.shutdown().await.unwrap();
}

#[tokio::test]
async fn non_finite_depth_scan_does_not_block_sync() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(MemoryArchive::default());
    let station = open_station(&dir, archive.clone()).await;

    let good = station.capture(draft(0)).await.unwrap();

    let mut points: Vec<DepthPoint> = (0..25)
        .map(|i| DepthPoint::new((i % 5) as f64 * 0.01, (i / 5) as f64 * 0.01, 0.0))
        .collect();
    points.push(DepthPoint::new(f64::NAN, 0.0, 0.0));
    points.push(DepthPoint::new(0.0, f64::INFINITY, 0.0));
    let mut measurement = DepthMeasurement::from_points(points, f64::NAN);
    measurement.roughness = f64::NAN;
    let glitched = station
        .capture(
            CaptureDraft::new()
                .with_location(f64::NAN, 151.2, Some(f64::INFINITY))
                .with_measurement(measurement)
                .with_detection("Calcite", 0.8),
        )
        .await
        .unwrap();

    let stored = station.get(&glitched).await.unwrap();
    let kept = stored.depth_measurement.as_ref().unwrap();
    assert!(kept.is_finite());
    assert_eq!(kept.points.len(), 25);
    assert_eq!(stored.location, None);
    assert_eq!(station.storage_stats().await.unwrap().pending_sync, 2);

    let report = station.on_connectivity_change(true).unwrap().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(station.get(&good).await.unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(station.get(&glitched).await.unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(station.storage_stats().await.unwrap().pending_sync, 0);

    station.shutdown().await.unwrap();
}
