//! Background Expiry Sweeper
//!
//! Lookups drop expired items they stumble upon, but an item that is never
//! asked for again would sit in memory forever. This task periodically
//! purges expired items from a [`MemoryStore`].
//!
//! ## Adaptive Frequency
//!
//! If a large share of items turn out to be expired, the sweeper runs more
//! often. If nothing expires, it backs off to save CPU.

use crate::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 1s)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 100ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 10s)
    pub max_interval: Duration,

    /// If this fraction of items are expired, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            speedup_threshold: 0.25,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<MemoryStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<MemoryStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let items_before = store.len();
        let purged = store.purge_expired();

        if items_before > 0 && purged as f64 / items_before as f64 > config.speedup_threshold {
            current_interval = (current_interval / 2).max(config.min_interval);
            debug!(
                purged = purged,
                new_interval_ms = current_interval.as_millis(),
                "High expiry rate, speeding up sweeper"
            );
        } else if purged == 0 {
            current_interval = (current_interval * 2).min(config.max_interval);
            trace!(
                new_interval_ms = current_interval.as_millis(),
                "Nothing expired, slowing down sweeper"
            );
        }

        if purged > 0 {
            debug!(
                purged = purged,
                items_remaining = store.len(),
                "Expired items purged"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(store: Arc<MemoryStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}
