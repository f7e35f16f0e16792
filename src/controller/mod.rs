//! Session launch controllers
//!
//! A [`SessionLauncher`] owns the pieces every run needs (engine, event sink,
//! task spawner, session template) and drives one of two runs:
//! - single: one session, polled until it finishes
//! - batch: sessions over a cyclic work catalog, admitted at a fixed interval
//!   while fewer than `concurrency` are active, then drained
//!
//! The shared [`ProgressCounter`] is created per run and only released after
//! the drain phase has observed `active == 0`.

mod batch;
mod error;
mod report;
mod single;
mod spawner;

pub use batch::BatchPlan;
pub use error::ControllerError;
pub use report::{RunMode, RunReport};
pub use spawner::{Job, TaskSpawner, ThreadSpawner};

use crate::engine::profile::DEFAULT_PROFILE;
use crate::engine::AsrEngine;
use crate::events::{EventSink, RunEvent};
use crate::progress::ProgressCounter;
use crate::session::{SessionDescriptor, SessionTask, DEFAULT_GRAMMAR};
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Poll period of the single-session run
pub const SINGLE_POLL_PERIOD: Duration = Duration::from_millis(2000);

/// Poll period of the batch drain phase
pub const DRAIN_POLL_PERIOD: Duration = Duration::from_millis(500);

/// Per-session settings shared by every task of a run
#[derive(Debug, Clone)]
pub struct SessionTemplate {
    pub grammar: String,
    pub params: Option<PathBuf>,
    pub profile: String,
}

impl Default for SessionTemplate {
    fn default() -> Self {
        Self {
            grammar: DEFAULT_GRAMMAR.to_string(),
            params: None,
            profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

/// Launches recognition sessions against one engine
pub struct SessionLauncher {
    engine: Arc<dyn AsrEngine>,
    events: Arc<dyn EventSink>,
    spawner: Arc<dyn TaskSpawner>,
    template: SessionTemplate,
    stop: Option<watch::Receiver<bool>>,
}

impl SessionLauncher {
    pub fn new(engine: Arc<dyn AsrEngine>, events: Arc<dyn EventSink>) -> Self {
        Self {
            engine,
            events,
            spawner: Arc::new(ThreadSpawner::new()),
            template: SessionTemplate::default(),
            stop: None,
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn with_template(mut self, template: SessionTemplate) -> Self {
        self.template = template;
        self
    }

    /// Stop admitting new sessions once `stop` turns true. In-flight
    /// sessions are still drained.
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Start one session for `input` and record its admission.
    ///
    /// The spawned task waits for a go signal, sent only after the counter has
    /// been incremented and `launched` emitted, so a fast task can never
    /// decrement before it was counted.
    fn admit(&self, progress: &Arc<ProgressCounter>, input: PathBuf) -> Result<usize, ControllerError> {
        let sequence = progress.snapshot().total + 1;

        let descriptor = SessionDescriptor {
            input: input.clone(),
            grammar: self.template.grammar.clone(),
            params: self
                .template
                .params
                .as_deref()
                .map(|p| self.engine.data_path(p)),
            profile: self.template.profile.clone(),
            sequence,
        };
        let task = SessionTask::new(
            descriptor,
            Arc::clone(&self.engine),
            Arc::clone(progress),
            Arc::clone(&self.events),
        );

        let (go_tx, go_rx) = mpsc::sync_channel::<()>(1);
        self.spawner
            .spawn(
                format!("asr-session-{}", sequence),
                Box::new(move || {
                    if go_rx.recv().is_ok() {
                        task.run();
                    }
                }),
            )
            .map_err(|source| ControllerError::Spawn { sequence, source })?;

        let after = progress.increment();
        self.events.emit(RunEvent::Launched {
            sequence: after.total,
            active: after.active,
            input,
        });
        if go_tx.send(()).is_err() {
            // The spawner accepted the job and then dropped it unrun. Nothing
            // will decrement for it, so close the admission here.
            progress.decrement_then(|now| {
                self.events.emit(RunEvent::Finished {
                    sequence,
                    total: now.total,
                    active: now.active,
                });
            });
            return Err(ControllerError::Spawn {
                sequence,
                source: io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "session job was dropped before it started",
                ),
            });
        }

        Ok(after.total)
    }

    /// Wait until every admitted session has finished, emitting `awaiting`
    /// every `period`.
    async fn drain(&self, progress: &ProgressCounter, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let idle = progress.wait_idle();
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = &mut idle => break,
                _ = ticker.tick() => {
                    let snapshot = progress.snapshot();
                    self.events.emit(RunEvent::Awaiting {
                        total: snapshot.total,
                        active: snapshot.active,
                    });
                }
            }
        }

        debug!("Run drained ({} sessions)", progress.snapshot().total);
    }

    /// Final event of a run; only called once the run has drained
    fn release(&self, progress: Arc<ProgressCounter>) -> usize {
        let snapshot = progress.snapshot();
        debug_assert_eq!(snapshot.active, 0, "released a run with active sessions");
        self.events.emit(RunEvent::Released {
            total: snapshot.total,
        });
        info!("All {} session(s) finished", snapshot.total);
        snapshot.total
    }
}

/// Resolves when a stop has been requested; never resolves without a signal
async fn stop_requested(stop: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = stop {
        if rx.wait_for(|stopped| *stopped).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
