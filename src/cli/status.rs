//! Status and export subcommands
//!
//! Both work purely from the progress file; nothing is fetched.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use super::build::{ArtifactArgs, Cli, LanguageArgs, OutputFormat};
use super::CliError;
use crate::resume::{ProgressState, ProgressStore};
use crate::word::{load_word_list, WorkItem};

/// Status command arguments
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Word list to count pending words against
    #[arg(long, short = 'w', env = "DICT_BUILDER_WORDS")]
    pub words: Option<PathBuf>,
}

/// Counts reported by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCounts {
    pub processed: usize,
    pub succeeded: usize,
    pub problematic: usize,
    /// Words from the list still to dispatch (problematic ones included)
    pub pending: Option<usize>,
    pub checkpoints: u64,
}

impl StatusCounts {
    pub fn from_state(state: &ProgressState, items: Option<&[WorkItem]>) -> Self {
        Self {
            processed: state.processed().len(),
            succeeded: state.succeeded().len(),
            problematic: state.problematic().len(),
            pending: items.map(|items| state.pending(items, true).len()),
            checkpoints: state.metadata().total_checkpoints(),
        }
    }
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = ProgressStore::new(&cli.progress_file);
        if !store.exists() {
            info!(path = %store.path().display(), "No progress file yet");
        }
        // Status is read-only: a damaged file is reported, never quarantined
        let state = store.verify()?;
        let items = self.words.as_deref().map(load_word_list).transpose()?;
        let counts = StatusCounts::from_state(&state, items.as_deref());

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "progress_file": store.path().display().to_string(),
                    "schema_version": state.schema_version(),
                    "processed": counts.processed,
                    "succeeded": counts.succeeded,
                    "problematic": counts.problematic,
                    "pending": counts.pending,
                    "checkpoints": counts.checkpoints,
                    "updated_at": state.metadata().updated_at(),
                })
            ),
            OutputFormat::Human => {
                println!("Progress file: {}", store.path().display());
                println!("  Processed:   {}", counts.processed);
                println!("  Succeeded:   {}", counts.succeeded);
                println!("  Problematic: {}", counts.problematic);
                if let Some(pending) = counts.pending {
                    println!("  Pending:     {pending}");
                }
                println!("  Checkpoints: {}", counts.checkpoints);
            }
        }
        Ok(())
    }
}

/// Export command arguments
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Word list supplying entry order and flags (optional)
    #[arg(long, short = 'w', env = "DICT_BUILDER_WORDS")]
    pub words: Option<PathBuf>,

    #[command(flatten)]
    pub languages: LanguageArgs,

    #[command(flatten)]
    pub artifact: ArtifactArgs,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let languages = self.languages.pair()?;
        let store = ProgressStore::new(&cli.progress_file);
        let state = store.load()?;
        let items = match &self.words {
            Some(path) => load_word_list(path)?,
            None => Vec::new(),
        };

        let counts = self.artifact.write(&state, &items, &languages)?;

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "success": true,
                    "entries_written": counts.entries,
                    "problematic": counts.problematic,
                    "output_path": self.artifact.output.display().to_string(),
                    "output_format": self.artifact.format.to_string(),
                    "report_path": self.artifact.report.display().to_string(),
                })
            ),
            OutputFormat::Human => {
                println!(
                    "Exported {} entries to {}",
                    counts.entries,
                    self.artifact.output.display()
                );
                println!(
                    "Report: {} ({} words)",
                    self.artifact.report.display(),
                    counts.problematic
                );
            }
        }
        Ok(())
    }
}
