use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, registry};

/// Log file created under the log directory
pub const LOG_FILE_NAME: &str = "asrclient.log";

/// Where diagnostics go (0-3 on the command line)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    None,
    Console,
    File,
    ConsoleAndFile,
}

impl LogOutput {
    pub fn from_mode(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(LogOutput::None),
            1 => Some(LogOutput::Console),
            2 => Some(LogOutput::File),
            3 => Some(LogOutput::ConsoleAndFile),
            _ => None,
        }
    }

    pub fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::ConsoleAndFile)
    }

    pub fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::ConsoleAndFile)
    }
}

/// Map a syslog-style priority (0 emergency .. 7 debug) onto a tracing level
pub fn level_for_priority(priority: u8) -> LevelFilter {
    match priority {
        0..=3 => LevelFilter::ERROR,
        4 => LevelFilter::WARN,
        5 | 6 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Install the global subscriber. Console output goes to stderr so stdout
/// carries only run events.
pub fn init(priority: u8, output: LogOutput, log_dir: &Path) -> Result<()> {
    let console = output
        .console()
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    let file = if output.file() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let path = log_dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    } else {
        None
    };

    registry()
        .with(level_for_priority(priority))
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
