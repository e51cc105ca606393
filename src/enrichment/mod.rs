pub mod catalog;
pub mod engine;

pub use catalog::{normalize_name, FormationReference, MineralReference, ReferenceCatalog};
pub use engine::{EnrichmentConfig, EnrichmentEngine};
