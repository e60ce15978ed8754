//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "tasks::cleanup";

/// Anything that can drop its expired entries on demand.
pub trait Sweep: Send + Sync + 'static {
    /// Removes expired entries, returning how many were dropped.
    fn sweep_expired(&self) -> usize;
}

// == Sweep Handle ==
/// Owner-side handle of a running sweep task.
///
/// `stop` is idempotent and may be called from any thread.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SweepHandle {
    /// Signals the task to finish. Safe to call repeatedly.
    pub fn stop(&self) {
        // Receiver already gone means the task has exited.
        let _ = self.shutdown.send(true);
        if mutex_lock(&self.task, SOURCE, "stop").take().is_some() {
            debug!("Sweep task stop requested");
        }
    }

    /// Returns true while the task has not been stopped or finished.
    pub fn is_running(&self) -> bool {
        mutex_lock(&self.task, SOURCE, "is_running")
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Spawns a background task that periodically sweeps `target`.
///
/// The task holds only a weak reference, so it ends on its own once the
/// target is dropped. Must be called from within a tokio runtime.
pub fn spawn_cleanup_task<S: Sweep>(
    target: Weak<S>,
    name: &'static str,
    interval: Duration,
) -> SweepHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(cache = name, interval_ms = interval.as_millis() as u64, "Starting TTL cleanup task");

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let Some(target) = target.upgrade() else {
                break;
            };
            let removed = target.sweep_expired();

            if removed > 0 {
                info!(cache = name, removed, "TTL cleanup: removed expired entries");
            } else {
                debug!(cache = name, "TTL cleanup: no expired entries found");
            }
        }

        info!(cache = name, "TTL cleanup task stopped");
    });

    SweepHandle {
        shutdown,
        task: Mutex::new(Some(task)),
    }
}
