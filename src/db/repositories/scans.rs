use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, from_json, from_optional_json, parse_datetime, parse_optional_datetime,
        parse_rock_type, parse_sync_status, parse_weathering, to_json, to_u32, to_u64,
    },
    models::{ImageRef, Location, ScanRecord, StorageStats, SyncMetadata, SyncStatus},
};
use crate::error::{StoreError, StoreResult};

const SCAN_COLUMNS: &str = "id,
    captured_at,
    latitude,
    longitude,
    elevation,
    image_uri,
    image_mime,
    image_blob,
    depth_measurement,
    geo_features,
    detections,
    geological_context,
    field_notes,
    rock_type,
    weathering_level,
    sync_status";

fn row_to_scan(row: &Row<'_>) -> StoreResult<ScanRecord> {
    let captured_at: String = row.get("captured_at")?;

    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
            elevation: row.get("elevation")?,
        }),
        _ => None,
    };

    let image_uri: Option<String> = row.get("image_uri")?;
    let image_mime: Option<String> = row.get("image_mime")?;
    let image_blob: Option<Vec<u8>> = row.get("image_blob")?;
    let image = match (image_uri, image_blob) {
        (Some(uri), _) => Some(ImageRef::Uri { uri }),
        (None, Some(bytes)) => Some(ImageRef::Inline {
            mime_type: image_mime.unwrap_or_default(),
            bytes,
        }),
        (None, None) => None,
    };

    let detections: String = row.get("detections")?;
    let context: String = row.get("geological_context")?;
    let rock_type: String = row.get("rock_type")?;
    let weathering: String = row.get("weathering_level")?;
    let status: String = row.get("sync_status")?;

    Ok(ScanRecord {
        id: row.get("id")?,
        captured_at: parse_datetime(&captured_at, "captured_at")?,
        location,
        image,
        depth_measurement: from_optional_json(row.get("depth_measurement")?, "depth_measurement")?,
        geo_features: from_optional_json(row.get("geo_features")?, "geo_features")?,
        detections: from_json(&detections, "detections")?,
        geological_context: from_json(&context, "geological_context")?,
        field_notes: row.get("field_notes")?,
        rock_type: parse_rock_type(&rock_type)?,
        weathering_level: parse_weathering(&weathering)?,
        sync_status: parse_sync_status(&status)?,
    })
}

fn current_status(tx: &Transaction<'_>, id: &str) -> StoreResult<SyncStatus> {
    let status: Option<String> = tx
        .query_row(
            "SELECT sync_status FROM scan_records WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match status {
        Some(raw) => parse_sync_status(&raw),
        None => Err(StoreError::NotFound(id.to_string())),
    }
}

fn write_failed(err: rusqlite::Error) -> StoreError {
    StoreError::WriteFailed(err.to_string())
}

/// Column values for one insert, encoded before the closure is shipped to
/// the worker so serialization errors surface on the caller's side.
struct EncodedScan {
    id: String,
    captured_at: String,
    location: Option<Location>,
    image_uri: Option<String>,
    image_mime: Option<String>,
    image_blob: Option<Vec<u8>>,
    depth_measurement: Option<String>,
    geo_features: Option<String>,
    detections: String,
    geological_context: String,
    field_notes: Option<String>,
    rock_type: &'static str,
    weathering_level: &'static str,
}

impl EncodedScan {
    fn encode(record: &ScanRecord) -> StoreResult<Self> {
        let (image_uri, image_mime, image_blob) = match &record.image {
            Some(ImageRef::Uri { uri }) => (Some(uri.clone()), None, None),
            Some(ImageRef::Inline { mime_type, bytes }) => {
                (None, Some(mime_type.clone()), Some(bytes.clone()))
            }
            None => (None, None, None),
        };

        Ok(Self {
            id: record.id.clone(),
            captured_at: format_datetime(&record.captured_at),
            location: record.location,
            image_uri,
            image_mime,
            image_blob,
            depth_measurement: record.depth_measurement.as_ref().map(to_json).transpose()?,
            geo_features: record.geo_features.as_ref().map(to_json).transpose()?,
            detections: to_json(&record.detections)?,
            geological_context: to_json(&record.geological_context)?,
            field_notes: record.field_notes.clone(),
            rock_type: record.rock_type.as_str(),
            weathering_level: record.weathering_level.as_str(),
        })
    }
}

impl Database {
    /// Inserts a record with status `pending`. Returns `false` when a record
    /// with the same id already exists; the stored record is left untouched.
    pub async fn insert_scan(&self, record: &ScanRecord) -> StoreResult<bool> {
        let scan = EncodedScan::encode(record)?;
        self.execute(move |conn| {
            let tx = conn.transaction().map_err(write_failed)?;
            let inserted = tx
                .execute(
                    "INSERT INTO scan_records (
                        id,
                        captured_at,
                        latitude,
                        longitude,
                        elevation,
                        image_uri,
                        image_mime,
                        image_blob,
                        depth_measurement,
                        geo_features,
                        detections,
                        geological_context,
                        field_notes,
                        rock_type,
                        weathering_level,
                        sync_status
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 'pending')
                    ON CONFLICT(id) DO NOTHING",
                    params![
                        scan.id,
                        scan.captured_at,
                        scan.location.map(|l| l.latitude),
                        scan.location.map(|l| l.longitude),
                        scan.location.and_then(|l| l.elevation),
                        scan.image_uri,
                        scan.image_mime,
                        scan.image_blob,
                        scan.depth_measurement,
                        scan.geo_features,
                        scan.detections,
                        scan.geological_context,
                        scan.field_notes,
                        scan.rock_type,
                        scan.weathering_level,
                    ],
                )
                .map_err(write_failed)?;
            tx.commit().map_err(write_failed)?;
            Ok(inserted == 1)
        })
        .await
    }

    pub async fn get_scan(&self, id: &str) -> StoreResult<ScanRecord> {
        let id = id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_records WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => row_to_scan(row),
                None => Err(StoreError::NotFound(id.clone())),
            }
        })
        .await
    }

    /// Records still owed to the archive, oldest capture first.
    pub async fn list_pending_scans(&self) -> StoreResult<Vec<ScanRecord>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SCAN_COLUMNS}
                FROM scan_records
                WHERE sync_status IN ('pending', 'failed') AND abandoned = 0
                ORDER BY captured_at ASC, seq ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;

            // One undecodable row must not hold back every other record.
            let mut scans = Vec::new();
            while let Some(row) = rows.next()? {
                match row_to_scan(row) {
                    Ok(scan) => scans.push(scan),
                    Err(err) => {
                        let id: Option<String> = row.get("id").ok();
                        warn!(
                            "Skipping undecodable scan {} in pending list: {err}",
                            id.as_deref().unwrap_or("<unknown>")
                        );
                    }
                }
            }
            Ok(scans)
        })
        .await
    }

    /// Most recent captures first.
    pub async fn list_scans(&self, limit: u32) -> StoreResult<Vec<ScanRecord>> {
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SCAN_COLUMNS}
                FROM scan_records
                ORDER BY captured_at DESC, seq DESC
                LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![limit])?;

            let mut scans = Vec::new();
            while let Some(row) = rows.next()? {
                match row_to_scan(row) {
                    Ok(scan) => scans.push(scan),
                    Err(err) => warn!("Skipping undecodable scan in recent list: {err}"),
                }
            }
            Ok(scans)
        })
        .await
    }

    /// Swaps the sync status and nothing else. Returns the previous status.
    pub async fn update_sync_status(&self, id: &str, status: SyncStatus) -> StoreResult<SyncStatus> {
        let id = id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction().map_err(write_failed)?;
            let previous = current_status(&tx, &id)?;
            if !previous.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: previous,
                    to: status,
                });
            }
            if previous != status {
                tx.execute(
                    "UPDATE scan_records SET sync_status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )
                .map_err(write_failed)?;
            }
            tx.commit().map_err(write_failed)?;
            Ok(previous)
        })
        .await
    }

    /// Marks a failed upload attempt. Returns the attempt count after the
    /// increment.
    pub async fn record_sync_failure(
        &self,
        id: &str,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<u32> {
        let id = id.to_string();
        let error = error.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction().map_err(write_failed)?;
            let previous = current_status(&tx, &id)?;
            if !previous.can_transition_to(SyncStatus::Failed) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: previous,
                    to: SyncStatus::Failed,
                });
            }
            tx.execute(
                "UPDATE scan_records
                 SET sync_status = 'failed',
                     sync_attempts = sync_attempts + 1,
                     last_sync_error = ?1,
                     last_attempt_at = ?2
                 WHERE id = ?3",
                params![error, format_datetime(&attempted_at), id],
            )
            .map_err(write_failed)?;
            let attempts: i64 = tx.query_row(
                "SELECT sync_attempts FROM scan_records WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            tx.commit().map_err(write_failed)?;
            to_u32(attempts, "sync_attempts")
        })
        .await
    }

    /// Removes a record from the pending set for good. Synced records are
    /// left as they are and report `false`.
    pub async fn abandon_scan(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction().map_err(write_failed)?;
            let status = current_status(&tx, &id)?;
            if status == SyncStatus::Synced {
                return Ok(false);
            }
            tx.execute(
                "UPDATE scan_records SET abandoned = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(write_failed)?;
            tx.commit().map_err(write_failed)?;
            Ok(true)
        })
        .await
    }

    pub async fn get_sync_metadata(&self, id: &str) -> StoreResult<SyncMetadata> {
        let id = id.to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT sync_status, sync_attempts, last_sync_error, last_attempt_at, abandoned
                     FROM scan_records WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((status, attempts, last_error, last_attempt_at, abandoned)) = row else {
                return Err(StoreError::NotFound(id));
            };

            Ok(SyncMetadata {
                status: parse_sync_status(&status)?,
                attempts: to_u32(attempts, "sync_attempts")?,
                last_error,
                last_attempt_at: parse_optional_datetime(last_attempt_at, "last_attempt_at")?,
                abandoned: abandoned != 0,
            })
        })
        .await
    }

    /// Full-scan aggregate. Size counts the bytes of every stored payload.
    pub async fn storage_stats(&self) -> StoreResult<StorageStats> {
        self.execute(|conn| {
            let (total, pending, failed, synced, abandoned, bytes) = conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN sync_status IN ('pending', 'failed') AND abandoned = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN sync_status = 'failed' AND abandoned = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN sync_status = 'synced' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN sync_status != 'synced' AND abandoned = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(
                        COALESCE(LENGTH(CAST(image_uri AS BLOB)), 0)
                        + COALESCE(LENGTH(image_blob), 0)
                        + COALESCE(LENGTH(CAST(depth_measurement AS BLOB)), 0)
                        + COALESCE(LENGTH(CAST(geo_features AS BLOB)), 0)
                        + LENGTH(CAST(detections AS BLOB))
                        + LENGTH(CAST(geological_context AS BLOB))
                        + COALESCE(LENGTH(CAST(field_notes AS BLOB)), 0)
                    ), 0)
                FROM scan_records",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )?;

            Ok(StorageStats {
                total_entries: to_u64(total, "total_entries")?,
                pending_sync: to_u64(pending, "pending_sync")?,
                failed: to_u64(failed, "failed")?,
                synced: to_u64(synced, "synced")?,
                abandoned: to_u64(abandoned, "abandoned")?,
                estimated_size_bytes: to_u64(bytes, "estimated_size_bytes")?,
            })
        })
        .await
    }
}
