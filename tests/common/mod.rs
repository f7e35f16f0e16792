// Shared helpers for controller and session integration tests

#![allow(dead_code)]

use anyhow::Result;
use asr_client::engine::{AsrEngine, AsrSession, EngineError};
use asr_client::{RunEvent, TaskSpawner, ThreadSpawner};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a scripted session behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed,
    FailCreate,
    FailRecognize,
    Panic,
}

#[derive(Debug, Default)]
pub struct EngineStats {
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub shut_down: AtomicBool,
}

/// Engine whose sessions sleep for `delay` and then follow `script`
pub struct ScriptedEngine {
    data_root: PathBuf,
    delay: Duration,
    script: Script,
    pub stats: Arc<EngineStats>,
}

impl ScriptedEngine {
    pub fn new(data_root: impl Into<PathBuf>, delay: Duration, script: Script) -> Self {
        Self {
            data_root: data_root.into(),
            delay,
            script,
            stats: Arc::new(EngineStats::default()),
        }
    }
}

impl AsrEngine for ScriptedEngine {
    fn create_session(&self, profile: &str) -> Result<Box<dyn AsrSession>, EngineError> {
        if self.script == Script::FailCreate {
            return Err(EngineError::SessionCreate(profile.to_string()));
        }

        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(open, Ordering::SeqCst);
        self.stats.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            delay: self.delay,
            script: self.script,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn data_path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.data_root.join(relative)
        }
    }

    fn shutdown(&self) {
        self.stats.shut_down.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSession {
    delay: Duration,
    script: Script,
    stats: Arc<EngineStats>,
}

impl AsrSession for ScriptedSession {
    fn recognize_file(
        &mut self,
        _grammar: &str,
        audio: &Path,
        _params: Option<&Path>,
    ) -> Result<String, EngineError> {
        std::thread::sleep(self.delay);
        match self.script {
            Script::FailRecognize => Err(EngineError::Recognize {
                path: audio.to_path_buf(),
                reason: "no match".to_string(),
            }),
            Script::Panic => panic!("engine crashed"),
            _ => Ok(format!(
                "heard {}",
                audio.file_stem().unwrap_or_default().to_string_lossy()
            )),
        }
    }

    fn destroy(self: Box<Self>) {
        self.stats.open.fetch_sub(1, Ordering::SeqCst);
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        // A panicking recognize never reaches destroy(); keep `open` honest.
        if std::thread::panicking() {
            self.stats.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Spawner that refuses every spawn after the first `allow`
pub struct FailingSpawner {
    allow: usize,
    spawned: AtomicUsize,
    inner: ThreadSpawner,
}

impl FailingSpawner {
    pub fn new(allow: usize) -> Self {
        Self {
            allow,
            spawned: AtomicUsize::new(0),
            inner: ThreadSpawner::new(),
        }
    }
}

impl TaskSpawner for FailingSpawner {
    fn spawn(&self, name: String, job: asr_client::controller::Job) -> io::Result<()> {
        if self.spawned.fetch_add(1, Ordering::SeqCst) >= self.allow {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "thread limit reached",
            ));
        }
        self.inner.spawn(name, job)
    }
}

/// Spawner that accepts every job and drops it without running it
#[derive(Default)]
pub struct DroppingSpawner {
    pub accepted: AtomicUsize,
}

impl TaskSpawner for DroppingSpawner {
    fn spawn(&self, _name: String, job: asr_client::controller::Job) -> io::Result<()> {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        drop(job);
        Ok(())
    }
}

/// Create empty files with the given names; the scripted engine never reads them
pub fn touch_files(dir: &Path, names: &[&str]) -> Result<Vec<PathBuf>> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, b"")?;
            Ok(path)
        })
        .collect()
}

/// Write a silent 16-bit mono WAV of `millis` milliseconds
pub fn write_wav(path: &Path, sample_rate: u32, millis: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..(sample_rate * millis / 1000) {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Sequence numbers of `launched` events, in emission order
pub fn launched_sequences(events: &[RunEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Launched { sequence, .. } => Some(*sequence),
            _ => None,
        })
        .collect()
}

/// Every `active` value a run reported, from any event
pub fn observed_active(events: &[RunEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Launched { active, .. }
            | RunEvent::Awaiting { active, .. }
            | RunEvent::Finished { active, .. } => Some(*active),
            _ => None,
        })
        .collect()
}
