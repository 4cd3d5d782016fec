//! Collaborator trait definitions for Shipwright
//!
//! These traits define the external boundaries of the resolution engine:
//! - `GitDataProvider`: branch/commit/tree/diff queries against a project
//! - `BuildSubmitter`: hands a finished manifest to the build service
//! - `OverrideProvider`: read-only environment override listings
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `CliGitProvider` implements the git
//! trait over the `git` binary.

use async_trait::async_trait;

use crate::error::DataResult;
use crate::types::{ChangeEntry, CommitRef, ManifestRequest, OverrideFile, SubmitReceipt};

/// Read-only git data source for one or more projects.
///
/// Guarantees:
/// - `list_commits` returns commits newest-first.
/// - `diff(base, head)` treats `base` as the earlier state and `head` as
///   the later one.
/// - `diff_scoped` returns the same entries `diff` would, restricted to
///   the given paths.
#[async_trait]
pub trait GitDataProvider: Send + Sync {
    /// List branch names for a project.
    async fn list_branches(&self, project_id: &str) -> DataResult<Vec<String>>;

    /// List commits reachable from a branch, newest first.
    async fn list_commits(&self, project_id: &str, branch: &str) -> DataResult<Vec<CommitRef>>;

    /// List every file path present at the branch head.
    async fn list_tree(&self, project_id: &str, branch: &str) -> DataResult<Vec<String>>;

    /// Changed files between two commits, with per-file patch text.
    async fn diff(&self, project_id: &str, base: &str, head: &str)
        -> DataResult<Vec<ChangeEntry>>;

    /// Changed files between two commits, restricted to `paths`.
    ///
    /// Used by preview so an alternate inspection range never re-fetches
    /// unrelated files. An empty `paths` slice yields an empty result.
    async fn diff_scoped(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> DataResult<Vec<ChangeEntry>>;
}

/// Build job submission boundary.
///
/// The job id inside the request is caller-supplied; submitting the same
/// request twice is therefore visible to the service as an explicit
/// re-submission, never an implicit retry.
#[async_trait]
pub trait BuildSubmitter: Send + Sync {
    /// Submit a manifest for building. The receipt echoes the job id.
    async fn submit(&self, request: &ManifestRequest) -> DataResult<SubmitReceipt>;
}

/// Read-only environment override listings.
///
/// Override content is applied downstream; this core only surfaces the
/// list so the operator can decide whether to set `apply_overrides`.
#[async_trait]
pub trait OverrideProvider: Send + Sync {
    /// List override files configured for an environment.
    async fn list_overrides(&self, environment: &str) -> DataResult<Vec<OverrideFile>>;
}
