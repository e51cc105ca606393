use std::convert::TryFrom;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::db::models::{RockType, SyncStatus, WeatheringLevel};
use crate::error::{StoreError, StoreResult};

/// Fixed-width RFC 3339 with nanoseconds, so lexical order in SQLite matches
/// chronological order and the value round-trips exactly.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("failed to parse {field} '{value}': {err}")))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> StoreResult<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn to_u32(value: i64, field: &str) -> StoreResult<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

pub fn to_u64(value: i64, field: &str) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{field} contains negative value {value}")))
}

pub fn parse_sync_status(value: &str) -> StoreResult<SyncStatus> {
    match value {
        "pending" => Ok(SyncStatus::Pending),
        "synced" => Ok(SyncStatus::Synced),
        "failed" => Ok(SyncStatus::Failed),
        other => Err(StoreError::Corrupt(format!("unknown sync status {other}"))),
    }
}

pub fn parse_rock_type(value: &str) -> StoreResult<RockType> {
    match value {
        "igneous" => Ok(RockType::Igneous),
        "sedimentary" => Ok(RockType::Sedimentary),
        "metamorphic" => Ok(RockType::Metamorphic),
        "unknown" => Ok(RockType::Unknown),
        other => Err(StoreError::Corrupt(format!("unknown rock type {other}"))),
    }
}

pub fn parse_weathering(value: &str) -> StoreResult<WeatheringLevel> {
    match value {
        "fresh" => Ok(WeatheringLevel::Fresh),
        "slight" => Ok(WeatheringLevel::Slight),
        "moderate" => Ok(WeatheringLevel::Moderate),
        "high" => Ok(WeatheringLevel::High),
        "extreme" => Ok(WeatheringLevel::Extreme),
        other => Err(StoreError::Corrupt(format!("unknown weathering level {other}"))),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn from_json<T: DeserializeOwned>(raw: &str, field: &str) -> StoreResult<T> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::Corrupt(format!("failed to decode {field}: {err}")))
}

pub fn from_optional_json<T: DeserializeOwned>(
    raw: Option<String>,
    field: &str,
) -> StoreResult<Option<T>> {
    raw.map(|value| from_json(&value, field)).transpose()
}
