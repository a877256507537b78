//! Periodic price checks.

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::watcher::{CheckOutcome, PriceWatcher};

/// Run `watcher.check()` every `period` until `cancel` fires.
///
/// The first check runs immediately. A tick that comes due while a check is still
/// running is dropped rather than queued.
pub async fn run_price_loop(
    watcher: Arc<PriceWatcher>,
    period: Duration,
    cancel: CancellationToken,
) -> usize {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(period_secs = period.as_secs(), "price loop started");
    let mut completed = 0usize;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                if watcher.check().await != CheckOutcome::Skipped {
                    completed += 1;
                }
            }
        }
    }
    info!(completed, "price loop stopped");
    completed
}

/// Spawn [`run_price_loop`] on the runtime.
pub fn spawn_price_loop(
    watcher: Arc<PriceWatcher>,
    period: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(run_price_loop(watcher, period, cancel))
}
