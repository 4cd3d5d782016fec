//! Shipwright provider layer
//!
//! Shared data types, async collaborator traits, a git-CLI-backed
//! provider, a caching wrapper, and in-memory fakes for testing.

pub mod cache;
pub mod error;
pub mod fakes;
pub mod git_cli;
pub mod traits;
pub mod types;

pub use cache::CachedGitProvider;
pub use error::{DataError, DataResult};
pub use git_cli::CliGitProvider;
pub use traits::{BuildSubmitter, GitDataProvider, OverrideProvider};
pub use types::{
    BuildStrategy, ChangeEntry, ChangeStatus, CommitRef, ManifestFile, ManifestRequest,
    OverrideFile, SubmitReceipt,
};
