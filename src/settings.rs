use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::analysis::AnalyzerConfig;
use crate::enrichment::EnrichmentConfig;
use crate::sync::SyncConfig;

const DEBUG_RETRY_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StationSettings {
    pub sync: SyncConfig,
    pub analysis: AnalyzerConfig,
    pub enrichment: EnrichmentConfig,
    /// File name of the scan database, relative to the data directory.
    pub database_file: String,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            analysis: AnalyzerConfig::default(),
            enrichment: EnrichmentConfig::default(),
            database_file: "fieldscan.sqlite3".into(),
        }
    }
}

impl StationSettings {
    /// Debug builds of the host retry every few seconds instead of minutes.
    pub fn with_debug_overrides(mut self, debug_mode: bool) -> Self {
        if debug_mode {
            self.sync.retry_interval_secs = DEBUG_RETRY_INTERVAL_SECS;
        }
        self
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }
}

/// `FIELDSCAN_DEBUG=1` or `FIELDSCAN_DEBUG=true`.
pub fn debug_mode() -> bool {
    std::env::var("FIELDSCAN_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StationSettings>,
}

impl SettingsStore {
    /// Loads the settings file. A missing or unreadable file falls back to
    /// defaults; nothing is written until the first update.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unparsable settings at {}: {err}",
                    path.display()
                );
                StationSettings::default()
            })
        } else {
            StationSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings, without environment overrides.
    pub fn stored(&self) -> StationSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Settings the station should run with.
    pub fn effective(&self) -> StationSettings {
        self.stored().with_debug_overrides(debug_mode())
    }

    pub fn update(&self, settings: StationSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn update_sync(&self, sync: SyncConfig) -> Result<()> {
        let mut next = self.stored();
        next.sync = sync;
        self.update(next)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: StationSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &StationSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
