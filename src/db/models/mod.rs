pub mod context;
pub mod detection;
pub mod measurement;
pub mod scan_record;

pub use context::GeologicalContext;
pub use detection::{
    EnhancedDetection, MineralClass, MineralDetection, MineralProperties, ReferenceMatch,
};
pub use measurement::{
    BoundingBox, DepthMeasurement, DepthPoint, FractureSeverity, GeoFeatures, GrainSize,
    SurfaceTexture,
};
pub use scan_record::{
    ImageRef, Location, RockType, ScanRecord, StorageStats, SyncMetadata, SyncStatus,
    WeatheringLevel,
};
