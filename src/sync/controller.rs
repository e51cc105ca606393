use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::coordinator::SyncCoordinator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Owns the periodic retry loop. Failed records re-enter the pending set on
/// every tick while the device is online.
pub struct SyncController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SyncController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, coordinator: Arc<SyncCoordinator>, retry_interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("sync retry loop already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(retry_loop(coordinator, retry_interval, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sync retry loop failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}

async fn retry_loop(
    coordinator: Arc<SyncCoordinator>,
    retry_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + retry_interval, retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("sync retry loop started (every {:?})", retry_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !coordinator.is_online() {
                    continue;
                }
                tokio::select! {
                    result = coordinator.sync_pending() => {
                        if let Err(err) = result {
                            log_error!("periodic sync pass failed: {err}");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        coordinator.cancel_batch();
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("sync retry loop shutting down");
}
