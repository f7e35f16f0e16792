use super::profile::{declared_profiles, DEFAULT_PROFILE};
use super::{AsrEngine, AsrSession, EngineError};
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Slowest pacing accepted; anything below it turns seconds of audio into
/// waits longer than a `Duration` can hold.
pub const MIN_REALTIME_RATE: f64 = 0.001;

/// Settings for [`SimulatedEngine`]
#[derive(Debug, Clone)]
pub struct SimulatedEngineConfig {
    /// Project root; data files resolve against `<root>/data`
    pub root_dir: PathBuf,

    /// Opaque client configuration blob, if one was generated
    pub client_config: Option<String>,

    /// Playback speed relative to real time. A 4s file at rate 2.0 takes 2s;
    /// 0 disables pacing.
    pub realtime_rate: f64,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            client_config: None,
            realtime_rate: 1.0,
        }
    }
}

/// In-process stand-in for the native ASR engine.
///
/// Sessions stream nothing over the network: recognition reads the WAV
/// header, waits as long as streaming the audio at `realtime_rate` would take
/// and answers with an NLSML result naming the input.
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    profiles: Vec<String>,
    open_sessions: Arc<AtomicUsize>,
    shut_down: AtomicBool,
}

impl SimulatedEngine {
    pub fn create(config: SimulatedEngineConfig) -> Result<Self> {
        validate_realtime_rate(config.realtime_rate)?;

        let mut profiles = vec![DEFAULT_PROFILE.to_string()];
        if let Some(blob) = &config.client_config {
            for id in declared_profiles(blob) {
                if !profiles.contains(&id) {
                    profiles.push(id);
                }
            }
        }

        info!(
            "Simulated ASR engine created (root: {}, profiles: {:?}, realtime rate: {})",
            config.root_dir.display(),
            profiles,
            config.realtime_rate
        );

        Ok(Self {
            config,
            profiles,
            open_sessions: Arc::new(AtomicUsize::new(0)),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Sessions created and not yet destroyed
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }
}

impl AsrEngine for SimulatedEngine {
    fn create_session(&self, profile: &str) -> Result<Box<dyn AsrSession>, EngineError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::SessionCreate(profile.to_string()));
        }
        if !self.profiles.iter().any(|p| p == profile) {
            warn!("Unknown client profile: {}", profile);
            return Err(EngineError::SessionCreate(profile.to_string()));
        }

        let open = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Session created on profile {} ({} open)", profile, open);

        Ok(Box::new(SimulatedSession {
            open_sessions: Arc::clone(&self.open_sessions),
            realtime_rate: self.config.realtime_rate,
        }))
    }

    fn data_path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.config.root_dir.join("data").join(relative)
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let open = self.open_sessions();
        if open > 0 {
            warn!("Shutting down simulated engine with {} open session(s)", open);
        }
        info!("Simulated ASR engine destroyed");
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Accepts 0 (no pacing) or a finite rate of at least [`MIN_REALTIME_RATE`]
pub fn validate_realtime_rate(rate: f64) -> Result<()> {
    if rate == 0.0 || (rate.is_finite() && rate >= MIN_REALTIME_RATE) {
        return Ok(());
    }
    anyhow::bail!(
        "Invalid realtime rate: {} (use 0 or a value of at least {})",
        rate,
        MIN_REALTIME_RATE
    )
}

/// Wall-clock time streaming `length` of audio takes at `rate`
fn paced(length: Duration, rate: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(length.as_secs_f64() / rate).with_context(|| {
        format!(
            "{:.2}s of audio cannot be paced at realtime rate {}",
            length.as_secs_f64(),
            rate
        )
    })
}

struct SimulatedSession {
    open_sessions: Arc<AtomicUsize>,
    realtime_rate: f64,
}

impl SimulatedSession {
    fn probe(audio: &Path) -> Result<Duration> {
        let reader = WavReader::open(audio).context("Failed to open WAV file")?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            anyhow::bail!("WAV header reports a zero sample rate");
        }

        // `duration` counts frames, so channel count is already folded in.
        let secs = reader.duration() as f64 / spec.sample_rate as f64;
        Ok(Duration::from_secs_f64(secs))
    }
}

impl AsrSession for SimulatedSession {
    fn recognize_file(
        &mut self,
        grammar: &str,
        audio: &Path,
        params: Option<&Path>,
    ) -> Result<String, EngineError> {
        let recognize_error = |reason: String| EngineError::Recognize {
            path: audio.to_path_buf(),
            reason,
        };

        if let Some(params) = params {
            if !params.exists() {
                return Err(recognize_error(format!(
                    "parameter file {} not found",
                    params.display()
                )));
            }
        }

        let length = Self::probe(audio).map_err(|e| recognize_error(format!("{:#}", e)))?;
        if self.realtime_rate > 0.0 {
            let wait = paced(length, self.realtime_rate)
                .map_err(|e| recognize_error(format!("{:#}", e)))?;
            std::thread::sleep(wait);
        }

        let utterance = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("Recognized {} ({:.2}s of audio)", audio.display(), length.as_secs_f64());

        Ok(format!(
            r#"<?xml version="1.0"?><result><interpretation grammar="{}" confidence="100"><instance>{}</instance><input mode="speech">{}</input></interpretation></result>"#,
            grammar, utterance, utterance
        ))
    }

    fn destroy(self: Box<Self>) {
        let open = self.open_sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Session destroyed ({} open)", open);
    }
}
