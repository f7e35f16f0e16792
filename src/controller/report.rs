use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Single,
    Batch,
}

/// Summary of one finished controller run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: Uuid,

    pub mode: RunMode,

    /// Number of sessions the run set out to launch
    pub target: usize,

    /// Number of sessions actually launched (all of them finished)
    pub launched: usize,

    /// Admission stopped early on an interrupt
    pub interrupted: bool,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in seconds, drain phase included
    pub duration_secs: f64,
}

impl RunReport {
    pub(crate) fn start(mode: RunMode, target: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            target,
            launched: 0,
            interrupted: false,
            started_at: Utc::now(),
            duration_secs: 0.0,
        }
    }

    pub(crate) fn finish(mut self, launched: usize, interrupted: bool) -> Self {
        let duration = Utc::now().signed_duration_since(self.started_at);
        self.launched = launched;
        self.interrupted = interrupted;
        self.duration_secs = duration.num_milliseconds() as f64 / 1000.0;
        self
    }
}
