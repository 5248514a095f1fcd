//! Periodic flush driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::SyncClient;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the background loop that flushes the outbound queue on a fixed
/// interval while the client is online. Ticks that land during a slow
/// flush are skipped rather than bursted; the flush guard inside the
/// client keeps driver and event-triggered flushes from overlapping.
pub(crate) fn spawn_flush_driver(
    client: Arc<SyncClient>,
    interval: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Periodic sync driver started ({:?} interval)", interval);

        let mut consecutive_failures = 0u32;
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("Periodic sync driver received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if !client.is_online() {
                        tracing::debug!("Skipping periodic flush while offline");
                        continue;
                    }

                    let result = client.flush_now().await;
                    if result.success {
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                        tracing::warn!(
                            "Periodic flush failed ({} consecutive): {:?}",
                            consecutive_failures,
                            result.errors
                        );
                    }
                }
            }
        }
        tracing::info!("Periodic sync driver stopped");
    })
}
