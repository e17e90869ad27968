//! Build command implementation

use crate::connector::{create_connector, ConnectorKind, ExtractPolicy, LanguagePair};
use crate::orchestrator::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_INTER_BATCH_DELAY_MS, DEFAULT_MAX_THROTTLE_RECOVERIES, DEFAULT_MIN_INTERVAL_MS,
    DEFAULT_THROTTLE_ATTEMPTS, DEFAULT_THROTTLE_BASE_SECS, DEFAULT_THROTTLE_CAP_SECS,
};
use crate::orchestrator::{
    BatchOrchestrator, CommandRotator, IdentityRotation, OrchestratorConfig, RateLimiter,
    RunReport, StdinOperatorGate, ThrottlePolicy,
};
use crate::output::{
    collect_entries, create_sink, write_problematic_report, ArtifactFormat, DictionaryInfo,
};
use crate::resume::{ProgressState, ProgressStore};
use crate::shutdown::SharedStop;
use crate::word::{load_word_list, WorkItem};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::CliError;

/// Maximum allowed concurrency to prevent self-inflicted throttling
const MAX_CONCURRENCY: usize = 32;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Resume modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Ignore the stored state (checkpoints are still written)
    Off,
    /// Resume from the stored state if present
    On,
    /// Delete the stored state and start fresh
    Reset,
    /// Check the stored state and exit
    Verify,
}

impl FromStr for ResumeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(ResumeMode::Off),
            "on" => Ok(ResumeMode::On),
            "reset" => Ok(ResumeMode::Reset),
            "verify" => Ok(ResumeMode::Verify),
            _ => Err(format!(
                "Invalid resume mode: {s}. Valid options: on, off, reset, verify"
            )),
        }
    }
}

/// Handle Verify mode: check the progress file without touching it
fn handle_resume_verify(
    store: &ProgressStore,
    output_format: OutputFormat,
) -> Result<(), CliError> {
    if !store.exists() {
        info!(path = %store.path().display(), "Verify mode: no progress file, nothing to verify");
    }

    match store.verify() {
        Ok(state) => {
            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "progress_file": store.path().display().to_string(),
                        "schema_version": state.schema_version(),
                        "processed": state.processed().len(),
                        "succeeded": state.succeeded().len(),
                        "problematic": state.problematic().len(),
                    })
                ),
                OutputFormat::Human => {
                    println!("Progress file is valid: {}", store.path().display());
                    println!("  Processed:   {}", state.processed().len());
                    println!("  Succeeded:   {}", state.succeeded().len());
                    println!("  Problematic: {}", state.problematic().len());
                }
            }
            Ok(())
        }
        Err(e) => {
            error!(path = %store.path().display(), error = %e, "Invalid progress file");
            Err(CliError::InvalidArgument(format!(
                "Verify failed: {e}. Use --resume reset to clear."
            )))
        }
    }
}

/// Dictionary builder CLI
#[derive(Parser, Debug)]
#[command(name = "dict-builder")]
#[command(
    about = "Build bilingual dictionaries from online translation sources",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human", env = "DICT_BUILDER_OUTPUT_FORMAT")]
    pub output_format: OutputFormat,

    /// Progress file holding the resumable state
    #[arg(
        long,
        global = true,
        default_value = "progress.json",
        env = "DICT_BUILDER_PROGRESS_FILE"
    )]
    pub progress_file: PathBuf,

    /// Maximum number of retries for transient request failures (range: 1-20)
    #[arg(
        long,
        global = true,
        default_value = "3",
        value_parser = clap::value_parser!(u32).range(1..=20)
    )]
    pub max_retries: u32,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true, env = "DICT_BUILDER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch translations for a word list and write the dictionary
    Build(BuildArgs),

    /// Show counts from the progress file
    Status(super::StatusArgs),

    /// Write the dictionary from the progress file without fetching
    Export(super::ExportArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Source and target language
#[derive(Args, Debug, Clone)]
pub struct LanguageArgs {
    /// Language of the word list (ISO 639 code)
    #[arg(long, default_value = "es", env = "DICT_BUILDER_SOURCE_LANG")]
    pub source_lang: String,

    /// Language to translate into (ISO 639 code)
    #[arg(long, default_value = "ko", env = "DICT_BUILDER_TARGET_LANG")]
    pub target_lang: String,
}

impl LanguageArgs {
    pub fn pair(&self) -> Result<LanguagePair, CliError> {
        Ok(LanguagePair::new(&self.source_lang, &self.target_lang)?)
    }
}

/// Where and how the dictionary is written
#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Dictionary output path
    #[arg(long, short = 'o', default_value = "dictionary.json", env = "DICT_BUILDER_OUTPUT")]
    pub output: PathBuf,

    /// Dictionary format
    #[arg(long, value_enum, default_value_t = ArtifactFormat::Yomitan)]
    pub format: ArtifactFormat,

    /// Problematic words report path
    #[arg(long, default_value = "problematic_words.txt", env = "DICT_BUILDER_REPORT")]
    pub report: PathBuf,

    /// Dictionary title (yomitan-zip only)
    #[arg(long)]
    pub title: Option<String>,
}

/// Counts written by [`ArtifactArgs::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactCounts {
    pub entries: usize,
    pub problematic: usize,
}

impl ArtifactArgs {
    /// Write the dictionary and the problematic report from `state`
    pub fn write(
        &self,
        state: &ProgressState,
        items: &[WorkItem],
        languages: &LanguagePair,
    ) -> Result<ArtifactCounts, CliError> {
        let mut info = DictionaryInfo::new(languages.source(), languages.target());
        if let Some(title) = &self.title {
            info = info.with_title(title);
        }

        let entries = collect_entries(state.succeeded(), items);
        create_sink(self.format, &self.output, info).write(&entries)?;
        let problematic = write_problematic_report(&self.report, state.problematic())?;

        Ok(ArtifactCounts {
            entries: entries.len(),
            problematic,
        })
    }
}

/// Build command arguments
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Word list (one word per line, optional `word|flags`, `#` comments)
    #[arg(long, short = 'w', env = "DICT_BUILDER_WORDS")]
    pub words: PathBuf,

    #[command(flatten)]
    pub languages: LanguageArgs,

    #[command(flatten)]
    pub artifact: ArtifactArgs,

    /// Translation source
    #[arg(
        long,
        value_enum,
        default_value_t = ConnectorKind::Google,
        env = "DICT_BUILDER_CONNECTOR"
    )]
    pub connector: ConnectorKind,

    /// Resume mode: on, off, reset, or verify
    #[arg(long, default_value = "on")]
    pub resume: ResumeMode,

    /// Concurrent requests per batch (max: 32)
    ///
    /// All workers share one rate limiter, so raising this mostly helps
    /// hide latency rather than increasing the request rate.
    #[arg(
        long,
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = parse_concurrency,
        env = "DICT_BUILDER_CONCURRENCY"
    )]
    pub concurrency: usize,

    /// Words per checkpointed batch
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub batch_size: usize,

    /// Minimum spacing between any two requests, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MIN_INTERVAL_MS, env = "DICT_BUILDER_MIN_INTERVAL_MS")]
    pub min_interval_ms: u64,

    /// Pause between batches, in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTER_BATCH_DELAY_MS)]
    pub inter_batch_delay_ms: u64,

    /// Per-request timeout, in milliseconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Treat a word as problematic when any optional field fails
    #[arg(long, default_value_t = false)]
    pub require_all_fields: bool,

    /// Shortest acceptable translation, in characters
    #[arg(long, default_value_t = 1)]
    pub min_translation_chars: usize,

    /// Do not retry words that failed in earlier runs
    #[arg(long, default_value_t = false)]
    pub skip_problematic: bool,

    /// First throttle backoff, in seconds
    #[arg(long, default_value_t = DEFAULT_THROTTLE_BASE_SECS)]
    pub throttle_base_secs: u64,

    /// Longest throttle backoff, in seconds
    #[arg(long, default_value_t = DEFAULT_THROTTLE_CAP_SECS)]
    pub throttle_cap_secs: u64,

    /// Backoff-and-probe attempts before rotating identity
    #[arg(long, default_value_t = DEFAULT_THROTTLE_ATTEMPTS)]
    pub throttle_attempts: u32,

    /// Throttle recoveries allowed per run
    #[arg(long, default_value_t = DEFAULT_MAX_THROTTLE_RECOVERIES)]
    pub max_throttle_recoveries: u32,

    /// Command that connects a new network identity (e.g. a VPN connect)
    #[arg(long, env = "DICT_BUILDER_ROTATE_CONNECT")]
    pub rotate_connect: Option<String>,

    /// Command that drops the current network identity
    #[arg(long, env = "DICT_BUILDER_ROTATE_DISCONNECT", requires = "rotate_connect")]
    pub rotate_disconnect: Option<String>,

    /// Never block on operator confirmation; unresolved throttling ends the run
    #[arg(long, default_value_t = false)]
    pub no_operator_gate: bool,
}

impl BuildArgs {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
            fetch_timeout: Duration::from_millis(self.timeout_ms),
            throttle: ThrottlePolicy {
                base: Duration::from_secs(self.throttle_base_secs),
                cap: Duration::from_secs(self.throttle_cap_secs.max(self.throttle_base_secs)),
                attempts: self.throttle_attempts,
            },
            max_throttle_recoveries: self.max_throttle_recoveries,
            retry_problematic: !self.skip_problematic,
        }
    }

    fn rotation(&self) -> Result<IdentityRotation, CliError> {
        let Some(connect) = &self.rotate_connect else {
            return Ok(IdentityRotation::Unavailable);
        };
        let rotator = CommandRotator::from_command_lines(connect, self.rotate_disconnect.as_deref())
            .ok_or_else(|| {
                CliError::InvalidArgument("--rotate-connect must not be empty".to_string())
            })?;
        Ok(IdentityRotation::available(rotator))
    }

    /// Load the starting state according to the resume mode
    fn initial_state(&self, store: &ProgressStore) -> Result<ProgressState, CliError> {
        match self.resume {
            ResumeMode::On => Ok(store.load()?),
            ResumeMode::Off => {
                if store.exists() {
                    warn!(
                        path = %store.path().display(),
                        "Resume off: ignoring existing progress file, it will be overwritten"
                    );
                }
                Ok(ProgressState::new())
            }
            ResumeMode::Reset => {
                info!(path = %store.path().display(), "Reset mode: deleting progress file");
                store.reset()?;
                Ok(ProgressState::new())
            }
            ResumeMode::Verify => Ok(store.verify()?),
        }
    }

    /// Execute the build command
    pub async fn execute(&self, cli: &Cli, stop: SharedStop) -> Result<(), CliError> {
        let store = ProgressStore::new(&cli.progress_file);
        if self.resume == ResumeMode::Verify {
            return handle_resume_verify(&store, cli.output_format);
        }

        let languages = self.languages.pair()?;
        let items = load_word_list(&self.words)?;
        let state = self.initial_state(&store)?;

        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(self.min_interval_ms)));
        let policy = ExtractPolicy {
            require_all_fields: self.require_all_fields,
            min_translation_chars: self.min_translation_chars,
        };
        let connector = create_connector(
            self.connector,
            languages.clone(),
            rate_limiter,
            policy,
            cli.max_retries,
        );

        let mut orchestrator = BatchOrchestrator::new(connector)
            .with_config(self.orchestrator_config())
            .with_store(store.clone())
            .with_rotation(self.rotation()?)
            .with_stop(stop);
        if !self.no_operator_gate && std::io::stdin().is_terminal() {
            orchestrator = orchestrator.with_operator_gate(Arc::new(StdinOperatorGate));
        }

        let pending = orchestrator.pending(&items, &state).len();
        let progress = create_progress_bar(pending as u64, &languages, self.connector);
        orchestrator = orchestrator.with_progress_bar(progress.clone());

        info!(
            words = items.len(),
            pending,
            connector = %self.connector,
            languages = %languages,
            "Starting dictionary build"
        );

        let result = orchestrator.run(&items, state).await;
        progress.finish_and_clear();
        let report = result?;

        let counts = self.artifact.write(&report.state, &items, &languages)?;

        match cli.output_format {
            OutputFormat::Json => output_json(&report, counts, &self.artifact, &store),
            OutputFormat::Human => output_human(&report, counts, &self.artifact),
        }
        Ok(())
    }
}

/// Output the run summary as JSON
fn output_json(
    report: &RunReport,
    counts: ArtifactCounts,
    artifact: &ArtifactArgs,
    store: &ProgressStore,
) {
    let summary = &report.summary;
    let output = serde_json::json!({
        "success": true,
        "stop_reason": report.stop_reason.as_str(),
        "pending_at_start": summary.pending,
        "batches": summary.batches,
        "processed": summary.processed,
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "throttle_recoveries": summary.throttle_recoveries,
        "total_processed": summary.total_processed,
        "total_succeeded": summary.total_succeeded,
        "total_problematic": summary.total_problematic,
        "success_rate": summary.success_rate(),
        "entries_written": counts.entries,
        "output_path": artifact.output.display().to_string(),
        "output_format": artifact.format.to_string(),
        "report_path": artifact.report.display().to_string(),
        "progress_file": store.path().display().to_string(),
    });
    println!("{output}");
}

/// Output the run summary in human-readable form
fn output_human(report: &RunReport, counts: ArtifactCounts, artifact: &ArtifactArgs) {
    let summary = &report.summary;
    if report.is_complete() {
        println!("\nBuild completed!");
    } else {
        println!("\nBuild stopped early ({}); rerun to continue.", report.stop_reason.as_str());
    }
    println!(
        "This run:    {} processed, {} succeeded, {} failed",
        summary.processed, summary.succeeded, summary.failed
    );
    println!("Processed:   {}", summary.total_processed);
    println!("Succeeded:   {}", summary.total_succeeded);
    println!("Problematic: {}", summary.total_problematic);
    println!("Success rate: {:.1}%", summary.success_rate());
    if summary.throttle_recoveries > 0 {
        println!("Throttle recoveries: {}", summary.throttle_recoveries);
    }
    println!(
        "Dictionary:  {} ({} entries, {})",
        artifact.output.display(),
        counts.entries,
        artifact.format
    );
    println!("Report:      {} ({} words)", artifact.report.display(), counts.problematic);
}

/// Create progress bar with style
fn create_progress_bar(
    pending: u64,
    languages: &LanguagePair,
    connector: ConnectorKind,
) -> ProgressBar {
    let pb = ProgressBar::new(pending);
    match ProgressStyle::default_bar().template(
        "{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} \
         ({percent}%) {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!(error = %e, "Invalid progress bar template, using default"),
    }
    pb.set_prefix(format!("{connector} {languages}"));
    pb
}
