//! Error types for the notarization pipeline.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotarizeError>;

#[derive(Debug, Error)]
pub enum NotarizeError {
    /// Missing or invalid input, absent product path, or an unwritable credential file.
    #[error("{0}")]
    Configuration(String),

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    /// The archiving tool failed to spawn or exited non-zero.
    #[error("Failed to create archive: {0}")]
    Packaging(String),

    /// The product disappeared between archiving and submission.
    #[error("{0}")]
    Precondition(String),

    /// The submission tool exited non-zero. `output` is `"{stdout}\n{stderr}"`.
    #[error("{output}")]
    Submission {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Notarization did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl NotarizeError {
    /// Packaging failures get their own top-level message and never reach the submitter.
    #[must_use]
    pub fn is_packaging(&self) -> bool {
        matches!(self, Self::Packaging(_))
    }
}
