use eex::engine::config::ConfigError;
use eex::engine::error::DataLayerError;
use eex::workflows::translate::WorkflowError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    DataLayer(#[from] DataLayerError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to process file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to format output: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Lifts file-level workflow failures into [`CliError::FileParsing`].
    pub fn from_workflow(error: WorkflowError) -> Self {
        match error {
            WorkflowError::Read { path, source } | WorkflowError::Write { path, source } => {
                CliError::FileParsing {
                    path,
                    source: source.into(),
                }
            }
            other => CliError::Workflow(other),
        }
    }
}
