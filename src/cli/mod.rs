//! CLI command implementations

pub mod build;
pub mod error;
pub mod status;

pub use build::{BuildArgs, Cli, Commands, OutputFormat, ResumeMode};
pub use error::CliError;
pub use status::{ExportArgs, StatusArgs};
