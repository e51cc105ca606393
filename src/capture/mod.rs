pub mod draft;
pub mod station;

pub use draft::CaptureDraft;
pub use station::FieldStation;
