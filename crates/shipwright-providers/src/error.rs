//! Error types for the provider layer

use thiserror::Error;

/// Errors that can occur while fetching external data
#[derive(Error, Debug)]
pub enum DataError {
    /// Underlying command (e.g. git) could not be started
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Underlying command ran but exited with a failure
    #[error("Provider command failed: {0}")]
    CommandFailed(String),

    /// Requested branch does not exist
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Requested commit does not exist
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    /// Provider output could not be parsed
    #[error("Unparseable provider output: {0}")]
    Parse(String),

    /// Submission rejected by the build service
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Unavailable(err.to_string())
    }
}

/// Result type for provider operations
pub type DataResult<T> = std::result::Result<T, DataError>;
