use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Uploads in flight at once. Zero is treated as one.
    pub max_concurrent_uploads: usize,
    pub upload_timeout_secs: u64,
    /// Period of the automatic retry pass while online.
    pub retry_interval_secs: u64,
    /// Failed attempts after which a record is abandoned. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 2,
            upload_timeout_secs: 30,
            retry_interval_secs: 300,
            max_attempts: None,
        }
    }
}

impl SyncConfig {
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_uploads.max(1)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }
}
