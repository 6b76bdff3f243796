//! Background expiry sweep.
//!
//! Periodically deletes files whose expiry time has passed, so storage is
//! reclaimed even for files nobody reads again.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::FileService;

/// Interval between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Expiry sweeper.
///
/// Runs [`FileService::purge_expired`] on a fixed interval until told to stop.
/// The first sweep happens one interval after start.
pub struct ExpirySweeper {
    service: Arc<FileService>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a new ExpirySweeper with the default interval.
    pub fn new(service: Arc<FileService>) -> Self {
        Self {
            service,
            interval: SWEEP_INTERVAL,
        }
    }

    /// Create a new ExpirySweeper with a custom interval.
    pub fn with_interval(service: Arc<FileService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run the sweep loop until `shutdown` flips to true or its sender is dropped.
    ///
    /// Shutdown is checked between files, never during one, so a stopped sweep
    /// leaves every file either fully deleted or untouched.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Expiry sweeper started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            let stop = shutdown.clone();

            tokio::select! {
                _ = timer.tick() => {
                    self.sweep(move || *stop.borrow()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// Run a single sweep, logging the outcome.
    async fn sweep<F>(&self, stop: F)
    where
        F: Fn() -> bool + Send + Sync,
    {
        debug!("Sweeping expired files");

        match self.service.purge_expired_until(stop).await {
            Ok(report) if report.scanned == 0 => debug!("No expired files"),
            Ok(report) => info!(
                "Sweep finished: {} expired, {} deleted, {} already gone, {} failed",
                report.scanned, report.deleted, report.already_gone, report.failed
            ),
            Err(e) => error!("Failed to scan for expired files: {}", e),
        }
    }
}

/// Handle to a running sweeper task.
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Ask the sweeper to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Expiry sweeper task failed: {}", e);
        }
    }

    /// Whether the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start the expiry sweeper as a background task.
pub fn start_expiry_sweeper(sweeper: ExpirySweeper) -> SweepHandle {
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        sweeper.run(rx).await;
    });
    SweepHandle { shutdown, task }
}
