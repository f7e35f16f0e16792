use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a whole controller run
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("cannot open audio directory {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no .{extension} files found in {path}")]
    EmptyCatalog { path: PathBuf, extension: String },

    #[error("failed to start session thread for sequence {sequence}: {source}")]
    Spawn {
        sequence: usize,
        #[source]
        source: io::Error,
    },

    #[error("invalid run plan: {0}")]
    InvalidPlan(String),
}

impl ControllerError {
    /// True when the run stopped before admitting anything
    pub fn is_rejected_before_admission(&self) -> bool {
        !matches!(self, ControllerError::Spawn { .. })
    }
}
