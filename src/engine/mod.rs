//! External ASR engine boundary
//!
//! The protocol work (SIP/MRCP negotiation, RTP media, result parsing) lives
//! in the engine. This crate only consumes it through two capability traits:
//! - [`AsrEngine`]: created once per process, hands out sessions
//! - [`AsrSession`]: one recognition attempt bound to a profile
//!
//! [`SimulatedEngine`] stands in for the native engine when none is linked.

pub mod profile;
pub mod simulated;

pub use profile::{ClientProfile, ExtraParams};
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures reported across the engine boundary
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine could not be created: {0}")]
    Create(String),

    #[error("session could not be created for profile '{0}'")]
    SessionCreate(String),

    #[error("recognition of {path} failed: {reason}")]
    Recognize { path: PathBuf, reason: String },
}

/// Capability interface of the ASR engine.
///
/// Implementations are shared by every session thread, so all methods take
/// `&self` and must be thread-safe.
pub trait AsrEngine: Send + Sync {
    /// Open a session using the named client profile
    fn create_session(&self, profile: &str) -> Result<Box<dyn AsrSession>, EngineError>;

    /// Resolve `relative` against the engine's configured data directory.
    /// Absolute paths are returned unchanged.
    fn data_path(&self, relative: &Path) -> PathBuf;

    /// Release engine-wide resources. Called once, after every run has drained.
    fn shutdown(&self);

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// One recognition session
pub trait AsrSession: Send {
    /// Recognize `audio` against `grammar`, blocking until the engine returns.
    ///
    /// No timeout is applied here: a hung engine call blocks the calling
    /// thread indefinitely.
    fn recognize_file(
        &mut self,
        grammar: &str,
        audio: &Path,
        params: Option<&Path>,
    ) -> Result<String, EngineError>;

    /// Tear the session down on the engine side
    fn destroy(self: Box<Self>);
}
