//! CLI error types and conversions

use crate::connector::ConnectorError;
use crate::orchestrator::OrchestratorError;
use crate::output::OutputError;
use crate::resume::ResumeError;
use crate::word::InputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Word list error
    #[error("input error: {0}")]
    InputError(#[from] InputError),

    /// Connector setup error
    #[error("connector error: {0}")]
    ConnectorError(#[from] ConnectorError),

    /// Run-level orchestration error
    #[error("run error: {0}")]
    OrchestratorError(#[from] OrchestratorError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Resume error
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
