use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::controller::{BatchPlan, SessionTemplate, DRAIN_POLL_PERIOD, SINGLE_POLL_PERIOD};
use crate::engine::profile::DEFAULT_PROFILE;
use crate::engine::simulated::validate_realtime_rate;
use crate::engine::{ClientProfile, ExtraParams, SimulatedEngineConfig};
use crate::session::DEFAULT_GRAMMAR;

/// Environment variable prefix, e.g. `ASRCLIENT__RUN__CONCURRENCY=4`
pub const ENV_PREFIX: &str = "ASRCLIENT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientConfig,
    pub run: RunConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Project root; `~` is expanded. Defaults to the working directory.
    pub root_dir: Option<String>,
    /// 0 (emergency) to 7 (debug)
    pub log_priority: u8,
    /// 0 none, 1 console, 2 file, 3 console and file
    pub log_output: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            log_priority: 7,
            log_output: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 0 single file, 1 batch directory
    pub test_type: u8,
    pub audio_file: String,
    pub audio_dir: String,
    pub audio_extension: String,
    pub concurrency: usize,
    pub interval_ms: u64,
    /// 0 means one session per discovered file
    pub total: usize,
    pub grammar: String,
    /// `-` or unset means no parameter file
    pub params_file: Option<String>,
    pub profile: String,
    /// `key=value,...` transport overrides for the client configuration
    pub extra: Option<String>,
    pub single_poll_ms: u64,
    pub drain_poll_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_type: 0,
            audio_file: "one-8kHz.wav".to_string(),
            audio_dir: "audio".to_string(),
            audio_extension: "wav".to_string(),
            concurrency: 1,
            interval_ms: 500,
            total: 0,
            grammar: DEFAULT_GRAMMAR.to_string(),
            params_file: None,
            profile: DEFAULT_PROFILE.to_string(),
            extra: None,
            single_poll_ms: SINGLE_POLL_PERIOD.as_millis() as u64,
            drain_poll_ms: DRAIN_POLL_PERIOD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pacing of the simulated engine; 0 answers immediately
    pub realtime_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { realtime_rate: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    Single,
    Batch,
    Unsupported(u8),
}

impl From<u8> for TestType {
    fn from(value: u8) -> Self {
        match value {
            0 => TestType::Single,
            1 => TestType::Batch,
            other => TestType::Unsupported(other),
        }
    }
}

impl Settings {
    /// Load settings from an optional file (any format the `config` crate
    /// recognizes by extension) and `ASRCLIENT__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn test_type(&self) -> TestType {
        TestType::from(self.run.test_type)
    }

    /// Clamp the concurrency limit to an explicit batch total.
    /// Returns true when the value was changed.
    pub fn normalize(&mut self) -> bool {
        let is_batch = self.test_type() == TestType::Batch;
        let run = &mut self.run;
        if is_batch && run.total != 0 && run.concurrency > run.total {
            warn!(
                "Concurrency ({}) is greater than total ({}), using {}",
                run.concurrency, run.total, run.total
            );
            run.concurrency = run.total;
            return true;
        }
        false
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.log_priority > 7 {
            anyhow::bail!("Log priority must be 0-7, got {}", self.client.log_priority);
        }
        if self.client.log_output > 3 {
            anyhow::bail!("Log output mode must be 0-3, got {}", self.client.log_output);
        }
        if self.test_type() == TestType::Batch && self.run.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1 for a batch run");
        }
        if self.run.audio_extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("Audio extension must not be empty");
        }
        validate_realtime_rate(self.engine.realtime_rate)?;
        Ok(())
    }

    pub fn root_dir(&self) -> PathBuf {
        match &self.client.root_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).as_ref()),
            None => PathBuf::from("."),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root_dir().join("log")
    }

    pub fn audio_file(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.run.audio_file).as_ref())
    }

    pub fn batch_plan(&self) -> BatchPlan {
        BatchPlan {
            audio_dir: PathBuf::from(shellexpand::tilde(&self.run.audio_dir).as_ref()),
            extension: self.run.audio_extension.trim_start_matches('.').to_string(),
            concurrency: self.run.concurrency,
            interval: Duration::from_millis(self.run.interval_ms),
            total: self.run.total,
            drain_poll: Duration::from_millis(self.run.drain_poll_ms),
        }
    }

    pub fn single_poll(&self) -> Duration {
        Duration::from_millis(self.run.single_poll_ms)
    }

    pub fn session_template(&self) -> SessionTemplate {
        let params = self
            .run
            .params_file
            .as_deref()
            .filter(|p| !p.is_empty() && !p.starts_with('-'))
            .map(PathBuf::from);

        SessionTemplate {
            grammar: self.run.grammar.clone(),
            params,
            profile: self.run.profile.clone(),
        }
    }

    /// Client configuration blob for the engine; only generated when extra
    /// parameters were given, otherwise the engine uses its own files.
    pub fn client_config_blob(&self) -> Option<String> {
        self.run
            .extra
            .as_deref()
            .map(|extra| ClientProfile::new(ExtraParams::parse(extra)).render())
    }

    pub fn engine_config(&self) -> SimulatedEngineConfig {
        SimulatedEngineConfig {
            root_dir: self.root_dir(),
            client_config: self.client_config_blob(),
            realtime_rate: self.engine.realtime_rate,
        }
    }
}
