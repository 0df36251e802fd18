//! Error types for debweb

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for debweb
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Failed to write {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", path.display())]
    ArtifactRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Command `{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Interrupted by shutdown signal")]
    Interrupted,
}

impl DeployError {
    /// Configuration and precondition failures are raised before any mutation
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            DeployError::InvalidConfiguration(_) | DeployError::Precondition(_)
        )
    }
}

impl From<dialoguer::Error> for DeployError {
    fn from(err: dialoguer::Error) -> Self {
        DeployError::Prompt(err.to_string())
    }
}
