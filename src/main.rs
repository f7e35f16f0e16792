use anyhow::{Context, Result};
use asr_client::logging::{self, LogOutput};
use asr_client::{
    AsrEngine, RunReport, SessionLauncher, Settings, SimulatedEngine, StdoutSink, TestType,
};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Prefix of operator-facing status lines on stdout
const BANNER: &str = "************************************";

#[derive(Parser, Debug)]
#[command(name = "asrclient")]
#[command(about = "Launch ASR recognition sessions singly or as a concurrent batch")]
struct Args {
    /// Project root directory
    #[arg(short = 'r', long = "root-dir")]
    root_dir: Option<String>,

    /// Log priority (0-emergency, ..., 7-debug)
    #[arg(short = 'l', long = "log-prio")]
    log_priority: Option<u8>,

    /// Log output mode (0-none, 1-console, 2-file, 3-console and file)
    #[arg(short = 'o', long = "log-output")]
    log_output: Option<u8>,

    /// Test type (0-single audio file, 1-batch over a directory)
    #[arg(short = 't', long = "type")]
    test_type: Option<u8>,

    /// Audio file for a single run
    #[arg(short = 'f', long = "audio-file")]
    audio_file: Option<String>,

    /// Audio directory for a batch run
    #[arg(short = 'd', long = "audio-dir")]
    audio_dir: Option<String>,

    /// Maximum concurrent sessions in a batch run
    #[arg(short = 'c', long = "conc")]
    concurrency: Option<usize>,

    /// Admission interval in milliseconds for a batch run
    #[arg(short = 'i', long = "interval")]
    interval_ms: Option<u64>,

    /// Sessions to launch in a batch run (default: one per audio file)
    #[arg(short = 'a', long = "total")]
    total: Option<usize>,

    /// Transport overrides, e.g. "n=2,client_port=8064,server_ip=10.0.0.5"
    #[arg(short = 'e', long = "extra")]
    extra: Option<String>,

    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/asrclient")]
    config: String,

    /// Exit non-zero on failure (2 config, 3 engine, 4 run)
    #[arg(long)]
    strict_exit: bool,

    /// Print the run report as JSON when the run ends
    #[arg(long)]
    json_summary: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(root_dir) = &self.root_dir {
            settings.client.root_dir = Some(root_dir.clone());
        }
        if let Some(priority) = self.log_priority {
            settings.client.log_priority = priority;
        }
        if let Some(output) = self.log_output {
            settings.client.log_output = output;
        }
        if let Some(test_type) = self.test_type {
            settings.run.test_type = test_type;
        }
        if let Some(audio_file) = &self.audio_file {
            settings.run.audio_file = audio_file.clone();
        }
        if let Some(audio_dir) = &self.audio_dir {
            settings.run.audio_dir = audio_dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            settings.run.concurrency = concurrency;
        }
        if let Some(interval_ms) = self.interval_ms {
            settings.run.interval_ms = interval_ms;
        }
        if let Some(total) = self.total {
            settings.run.total = total;
        }
        if let Some(extra) = &self.extra {
            settings.run.extra = Some(extra.clone());
        }
    }
}

enum Failure {
    Config(anyhow::Error),
    Engine(anyhow::Error),
    Run(anyhow::Error),
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Failure::Config(_) => 2,
            Failure::Engine(_) => 3,
            Failure::Run(_) => 4,
        }
    }

    fn error(&self) -> &anyhow::Error {
        match self {
            Failure::Config(e) | Failure::Engine(e) | Failure::Run(e) => e,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let strict_exit = args.strict_exit;

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            println!("{}{:#}", BANNER, failure.error());
            if strict_exit {
                ExitCode::from(failure.exit_code())
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// File, environment and command line, validated as a whole
fn load_settings(args: &Args) -> Result<Settings, Failure> {
    let mut settings = Settings::load(&args.config).map_err(Failure::Config)?;
    args.apply(&mut settings);
    settings.validate().map_err(Failure::Config)?;
    Ok(settings)
}

async fn run(args: Args) -> Result<(), Failure> {
    // Logging is only installed from settings that passed validation.
    let mut settings = load_settings(&args)?;
    let output = LogOutput::from_mode(settings.client.log_output)
        .with_context(|| format!("Log output mode must be 0-3, got {}", settings.client.log_output))
        .map_err(Failure::Config)?;
    logging::init(settings.client.log_priority, output, &settings.log_dir())
        .map_err(Failure::Config)?;

    if settings.normalize() {
        println!(
            "{}Concurrent number is greater than total number ({}), reset as the same value.",
            BANNER, settings.run.total
        );
    }

    let engine: Arc<dyn AsrEngine> = Arc::new(
        SimulatedEngine::create(settings.engine_config())
            .context("Failed to create ASR engine")
            .map_err(Failure::Engine)?,
    );
    info!("Using {} engine", engine.name());

    let launcher = SessionLauncher::new(Arc::clone(&engine), Arc::new(StdoutSink))
        .with_template(settings.session_template())
        .with_stop_signal(watch_interrupts(args.strict_exit));

    let result = launch(&launcher, &settings).await;
    engine.shutdown();

    match result {
        Ok(Some(report)) => {
            info!(
                "Run {} finished: {}/{} session(s) in {:.1}s",
                report.run_id, report.launched, report.target, report.duration_secs
            );
            if args.json_summary {
                let json = serde_json::to_string(&report)
                    .context("Failed to encode run report")
                    .map_err(Failure::Run)?;
                println!("{}", json);
            }
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(Failure::Run(e)),
    }
}

async fn launch(launcher: &SessionLauncher, settings: &Settings) -> Result<Option<RunReport>> {
    match settings.test_type() {
        TestType::Single => {
            let audio_file = settings.audio_file();
            println!(
                "{}Test type: 0, audio file path: {}.",
                BANNER,
                audio_file.display()
            );
            let report = launcher
                .launch_single(&audio_file, settings.single_poll())
                .await?;
            Ok(Some(report))
        }
        TestType::Batch => {
            let plan = settings.batch_plan();
            println!(
                "{}Test type: 1, audio dir path: {}, concurrent number: {}, interval time: {}(ms), total number: {}.",
                BANNER,
                plan.audio_dir.display(),
                plan.concurrency,
                plan.interval.as_millis(),
                plan.total
            );
            let report = launcher.launch_batch(&plan).await?;
            Ok(Some(report))
        }
        TestType::Unsupported(other) => {
            println!("{}Test type: {}, nothing to do.", BANNER, other);
            Ok(None)
        }
    }
}

/// Exit status after a second Ctrl-C
fn forced_exit_code(strict_exit: bool) -> i32 {
    if strict_exit {
        130
    } else {
        0
    }
}

/// First Ctrl-C stops admission and lets running sessions finish; a second
/// one exits immediately, with 130 only under `--strict-exit`.
fn watch_interrupts(strict_exit: bool) -> watch::Receiver<bool> {
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        warn!("Interrupted, waiting for running sessions to finish (Ctrl-C again to exit)");
        let _ = stop_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted again, exiting with sessions still running");
            std::process::exit(forced_exit_code(strict_exit));
        }
    });

    stop_rx
}
