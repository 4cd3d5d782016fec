//! Error types for the resolution engine

use shipwright_providers::DataError;
use thiserror::Error;

/// Errors surfaced by the engine to the operator
#[derive(Error, Debug)]
pub enum EngineError {
    /// A precondition on operator input failed (empty selection, no
    /// project chosen, unknown path). Blocks the current transition.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// SingleCommit strategy selected the oldest loaded commit; there is
    /// no following commit to diff against. The operator must load more
    /// history or pick a different commit.
    #[error("Commit {sha} has no parent in the loaded history")]
    NoParentCommit { sha: String },

    /// The requested pipeline step transition is not allowed.
    #[error("Invalid step transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// An external fetch failed. Non-fatal; the affected step stays
    /// incomplete until the input changes and the fetch is retried.
    #[error("Data fetch failed: {0}")]
    Fetch(#[from] DataError),
}

impl EngineError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        EngineError::Validation {
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors from parsing one file's unified diff text.
///
/// Isolated to that file's preview rendering; never aborts the tree or
/// the selection.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiffParseError {
    #[error("Malformed hunk header: {0}")]
    BadHunkHeader(String),

    #[error("Unexpected line inside hunk: {0}")]
    UnexpectedLine(String),

    #[error("Hunk line counts do not match header: {0}")]
    CountMismatch(String),

    #[error("No hunks found in patch text")]
    NoHunks,
}
