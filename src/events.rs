//! Run lifecycle events
//!
//! Every controller run reports what it does as a stream of [`RunEvent`]s:
//! - `launched` when a task is admitted
//! - `awaiting` on each poll tick while tasks are in flight
//! - `resulted` when a task's recognition call returns
//! - `finished` when a task has released its session and decremented the counter
//! - `released` once the run's resources are dropped
//!
//! The operator-facing rendering is one line per event:
//! `TIMESTAMP [ASRCLIENT] [event] [fields...]`.

use chrono::{DateTime, Local};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Tag printed in every event line
pub const EVENT_TAG: &str = "ASRCLIENT";

/// What a recognition attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Result string returned by the engine
    Text(String),
    /// Session creation or recognition failed
    Failed(String),
}

impl fmt::Display for RecognitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionOutcome::Text(text) => write!(f, "{}", text),
            RecognitionOutcome::Failed(reason) => write!(f, "<error: {}>", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Launched {
        sequence: usize,
        active: usize,
        input: PathBuf,
    },
    Awaiting {
        total: usize,
        active: usize,
    },
    Resulted {
        sequence: usize,
        input: PathBuf,
        outcome: RecognitionOutcome,
    },
    Finished {
        sequence: usize,
        total: usize,
        active: usize,
    },
    Released {
        total: usize,
    },
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Launched { .. } => "launched",
            RunEvent::Awaiting { .. } => "awaiting",
            RunEvent::Resulted { .. } => "resulted",
            RunEvent::Finished { .. } => "finished",
            RunEvent::Released { .. } => "released",
        }
    }

    /// Render the event as a log line stamped with `at`
    pub fn render(&self, at: DateTime<Local>) -> String {
        format!(
            "{} [{}] [{}] {}",
            at.format("%Y-%m-%d %H:%M:%S:%6f"),
            EVENT_TAG,
            self.name(),
            self.fields()
        )
    }

    fn fields(&self) -> String {
        match self {
            RunEvent::Launched { sequence, active, input } => {
                format!("[{}] [{}] [file:{}]", sequence, active, input.display())
            }
            RunEvent::Awaiting { total, active } => format!("[{}] [{}]", total, active),
            RunEvent::Resulted { sequence, input, outcome } => {
                format!("[seq-{}] [file:{}] [text:{}]", sequence, input.display(), outcome)
            }
            RunEvent::Finished { sequence, total, active } => {
                format!("[seq-{}] [{}] [{}]", sequence, total, active)
            }
            RunEvent::Released { total } => format!("[{}]", total),
        }
    }
}

/// Destination for run events. Called from the controller and from every
/// session thread.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Writes rendered event lines to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: RunEvent) {
        let line = event.render(Local::now());
        debug!(event = event.name(), "{}", line);

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A closed stdout must not take a session thread down with it.
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RunEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RunEvent) {
        debug!(event = event.name(), "{:?}", event);
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
