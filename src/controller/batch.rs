use super::{stop_requested, ControllerError, RunMode, RunReport, SessionLauncher, DRAIN_POLL_PERIOD};
use crate::catalog::WorkCatalog;
use crate::events::RunEvent;
use crate::progress::ProgressCounter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Parameters of one batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Directory holding the audio files, resolved against the engine's data directory
    pub audio_dir: PathBuf,

    /// Extension of the files to pick up, without the dot
    pub extension: String,

    /// Maximum number of sessions running at once
    pub concurrency: usize,

    /// Time between admission attempts
    pub interval: Duration,

    /// Sessions to launch; 0 means one per discovered file
    pub total: usize,

    /// Poll period once admission is over
    pub drain_poll: Duration,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio"),
            extension: "wav".to_string(),
            concurrency: 1,
            interval: Duration::from_millis(500),
            total: 0,
            drain_poll: DRAIN_POLL_PERIOD,
        }
    }
}

impl SessionLauncher {
    /// Launch `plan.total` sessions over the files of `plan.audio_dir`, at
    /// most `plan.concurrency` at a time, one admission attempt per
    /// `plan.interval`. Returns once every launched session has finished.
    ///
    /// Directory and catalog problems are reported before anything is
    /// admitted. A thread that cannot be started ends admission early; the
    /// sessions already running are drained before the error is returned.
    pub async fn launch_batch(&self, plan: &BatchPlan) -> Result<RunReport, ControllerError> {
        if plan.concurrency == 0 {
            return Err(ControllerError::InvalidPlan(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let dir = self.engine.data_path(&plan.audio_dir);
        let mut catalog = WorkCatalog::discover(&dir, &plan.extension).map_err(|source| {
            error!("Cannot open audio directory {}: {}", dir.display(), source);
            ControllerError::DirectoryUnavailable {
                path: dir.clone(),
                source,
            }
        })?;

        if catalog.is_empty() {
            error!("No .{} files in {}", plan.extension, dir.display());
            return Err(ControllerError::EmptyCatalog {
                path: dir,
                extension: plan.extension.clone(),
            });
        }

        let target = if plan.total == 0 {
            catalog.len()
        } else {
            plan.total
        };
        catalog.rewind();

        info!(
            "Batch run: {} session(s) over {} file(s) in {}, concurrency {}, interval {}ms",
            target,
            catalog.len(),
            dir.display(),
            plan.concurrency,
            plan.interval.as_millis()
        );

        let report = RunReport::start(RunMode::Batch, target);
        let progress = Arc::new(ProgressCounter::new());
        let mut stop = self.stop.clone();
        let mut interrupted = false;
        let mut failure = None;

        let interval = plan.interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while progress.snapshot().total < target {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_requested(&mut stop) => {
                    warn!("Stop requested, no further sessions will be admitted");
                    interrupted = true;
                    break;
                }
            }

            let snapshot = progress.snapshot();
            if snapshot.active >= plan.concurrency {
                self.events.emit(RunEvent::Awaiting {
                    total: snapshot.total,
                    active: snapshot.active,
                });
                continue;
            }

            let Some(input) = catalog.next_path() else {
                break;
            };
            if let Err(e) = self.admit(&progress, input) {
                error!("Aborting batch run: {}", e);
                failure = Some(e);
                break;
            }
        }

        self.drain(&progress, plan.drain_poll).await;
        drop(catalog);
        let launched = self.release(progress);

        match failure {
            Some(e) => Err(e),
            None => Ok(report.finish(launched, interrupted)),
        }
    }
}
