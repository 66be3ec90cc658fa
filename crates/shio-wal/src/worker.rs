//! Background durability worker.
//!
//! A single cooperative task that flushes and fsyncs the tail on two
//! triggers: enough buffered bytes since the last sync, or a one-second
//! timer. The hot append path never waits on fsync; the loss window is
//! bounded by `min(max_sync_size bytes, 1 second)`.

use crate::segment::SegmentManager;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Signals the writer sends to the worker.
///
/// One ordered channel carries both variants, so a rotation reset can never
/// overtake the append notifications that preceded it.
#[derive(Debug)]
pub(crate) enum Signal {
    /// `n` framed bytes were appended to the tail buffer.
    Appended(u64),
    /// The tail rotated; the sealed segment's bytes were already fsynced.
    RotationReset,
}

pub(crate) const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the worker. It exits when the signal channel closes (log closed
/// or dropped), after one final drain sync.
///
/// The worker holds the manager weakly: a `Wal` dropped without `close()`
/// must not be kept alive by its own background task.
pub(crate) fn spawn(
    manager: Weak<SegmentManager>,
    mut signals: UnboundedReceiver<Signal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: u64 = 0;
        let mut ticker = interval_at(Instant::now() + SYNC_INTERVAL, SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !sync_or_latch(&manager).await {
                        break;
                    }
                }
                signal = signals.recv() => match signal {
                    Some(Signal::Appended(n)) => {
                        pending += n;
                        if pending >= max_sync_size(&manager) {
                            if !sync_or_latch(&manager).await {
                                break;
                            }
                            pending = 0;
                        }
                    }
                    Some(Signal::RotationReset) => pending = 0,
                    None => {
                        // Log is closing; drain whatever is still buffered.
                        sync_or_latch(&manager).await;
                        break;
                    }
                },
            }
        }
    })
}

fn max_sync_size(manager: &Weak<SegmentManager>) -> u64 {
    manager
        .upgrade()
        .map(|m| m.max_sync_size())
        .unwrap_or(u64::MAX)
}

/// Returns false once the manager is gone and the worker should exit.
async fn sync_or_latch(manager: &Weak<SegmentManager>) -> bool {
    let Some(manager) = manager.upgrade() else {
        return false;
    };
    if let Err(err) = manager.sync_from_worker().await {
        tracing::warn!(%err, "background fsync failed");
        manager.latch_worker_error(err);
    }
    true
}
