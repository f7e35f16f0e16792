//! Recognition session tasks
//!
//! This module provides the per-session unit of work launched by the
//! controllers:
//! - `SessionDescriptor`: what to recognize and how (input, grammar, profile, sequence)
//! - `SessionTask`: runs one descriptor against the engine and reports
//!   `resulted`/`finished` events, decrementing the shared counter exactly once

mod descriptor;
mod task;

pub use descriptor::{SessionDescriptor, DEFAULT_GRAMMAR};
pub use task::SessionTask;
