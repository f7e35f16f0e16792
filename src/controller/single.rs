use super::{ControllerError, RunMode, RunReport, SessionLauncher};
use crate::progress::ProgressCounter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

impl SessionLauncher {
    /// Run exactly one session for `input` and wait for it to finish,
    /// reporting `awaiting` every `poll` while it runs.
    ///
    /// `input` is resolved against the engine's data directory. Fails only if
    /// the session could not be started; a session already reported as
    /// launched is closed with `finished` and `released` first.
    pub async fn launch_single(
        &self,
        input: &Path,
        poll: Duration,
    ) -> Result<RunReport, ControllerError> {
        let input = self.engine.data_path(input);
        info!("Single-session run on {}", input.display());

        let report = RunReport::start(RunMode::Single, 1);
        let progress = Arc::new(ProgressCounter::new());

        if let Err(e) = self.admit(&progress, input) {
            error!("Could not launch session: {}", e);
            if progress.snapshot().total > 0 {
                self.release(progress);
            }
            return Err(e);
        }

        self.drain(&progress, poll).await;
        let launched = self.release(progress);

        Ok(report.finish(launched, false))
    }
}
