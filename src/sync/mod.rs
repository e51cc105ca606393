pub mod archive;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod coordinator;

pub use archive::{ArchiveAck, RemoteArchive};
pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use controller::SyncController;
pub use coordinator::{SyncCoordinator, SyncReport};
