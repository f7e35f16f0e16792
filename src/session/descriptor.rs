use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::profile::DEFAULT_PROFILE;

/// Grammar referenced by every session unless overridden
pub const DEFAULT_GRAMMAR: &str = "grammar.xml";

/// Everything one recognition attempt needs. Immutable once admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Audio file to recognize
    pub input: PathBuf,

    /// Grammar reference passed through to the engine
    pub grammar: String,

    /// Optional recognition parameter file
    pub params: Option<PathBuf>,

    /// Client profile the session is created on
    pub profile: String,

    /// 1-based admission order within one run
    pub sequence: usize,
}

impl SessionDescriptor {
    pub fn new(input: impl Into<PathBuf>, sequence: usize) -> Self {
        Self {
            input: input.into(),
            grammar: DEFAULT_GRAMMAR.to_string(),
            params: None,
            profile: DEFAULT_PROFILE.to_string(),
            sequence,
        }
    }
}
