//! Offline-first capture store and sync engine for field scan records.
//!
//! The host shell calls [`FieldStation::initialize`] once, [`FieldStation::capture`]
//! per observation, and [`FieldStation::sync_pending`] or
//! [`FieldStation::on_connectivity_change`] when the network comes back.

mod utils;

pub mod analysis;
pub mod capture;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod settings;
pub mod sync;

pub use analysis::{AnalyzerConfig, DepthFeatureAnalyzer};
pub use capture::{CaptureDraft, FieldStation};
pub use db::models::*;
pub use db::{ScanStore, SqliteScanStore};
pub use enrichment::{EnrichmentConfig, EnrichmentEngine, ReferenceCatalog};
pub use error::{StoreError, StoreResult, SyncError, UploadError};
pub use settings::{SettingsStore, StationSettings};
pub use sync::{
    ArchiveAck, ConnectivityMonitor, RemoteArchive, SyncConfig, SyncController, SyncCoordinator,
    SyncReport,
};

/// Initialises `env_logger`, honouring `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
