use std::io;
use std::thread;
use tracing::debug;

/// Work handed to a spawner; runs exactly once
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Starts session tasks concurrently with the controller.
///
/// `spawn` either takes ownership of the job and guarantees it will run, or
/// returns an error and drops it unrun.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, name: String, job: Job) -> io::Result<()>;
}

/// One detached OS thread per session
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl ThreadSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, name: String, job: Job) -> io::Result<()> {
        thread::Builder::new().name(name.clone()).spawn(job)?;
        debug!("Spawned thread {}", name);
        Ok(())
    }
}
