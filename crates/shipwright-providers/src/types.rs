//! Shared data types for build manifest resolution.
//!
//! These are the wire-facing records exchanged between the engine and its
//! collaborators: change entries coming back from git, commit references,
//! environment overrides, and the final manifest request handed to the
//! build submission service.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a file changed between the base and head of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    /// Used for Manual-strategy listings, where no diff is computed.
    Unmodified,
}

impl ChangeStatus {
    /// Short label for human-facing output.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Unmodified => "unmodified",
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One file known to be relevant under the active strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Repository-relative path, `/`-separated.
    pub path: String,
    /// Change status relative to the diff base.
    pub status: ChangeStatus,
    /// Unified diff text for this file, when a diff was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl ChangeEntry {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        self.patch = Some(patch.into());
        self
    }
}

/// A single commit as displayed to the operator.
///
/// Commit lists are always ordered newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub message: String,
}

impl CommitRef {
    pub fn new(sha: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
        }
    }

    /// Abbreviated sha for display.
    pub fn short_sha(&self) -> &str {
        &self.sha[..8.min(self.sha.len())]
    }
}

/// Environment-specific replacement content for a file path.
///
/// Overrides are applied downstream of this core; the engine only surfaces
/// them and forwards the `apply_overrides` decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideFile {
    pub file_path: String,
    pub content: String,
}

/// How the file set for a build is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Diff the newest loaded commit against the oldest.
    Full,
    /// Diff one chosen commit against its parent in displayed order.
    SingleCommit,
    /// No diff; the operator picks from the full tree at branch head.
    Manual,
}

impl BuildStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            BuildStrategy::Full => "full",
            BuildStrategy::SingleCommit => "single_commit",
            BuildStrategy::Manual => "manual",
        }
    }
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One file in the final manifest: path plus the status it carried in the
/// authoritative change list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub status: ChangeStatus,
}

/// The final, submitted description of which files go into a build.
///
/// `job_id` is caller-generated, so re-submission is an explicit decision
/// rather than an implicit retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRequest {
    pub job_id: String,
    pub project_id: String,
    pub strategy: BuildStrategy,
    pub base_sha: Option<String>,
    pub head_sha: Option<String>,
    pub files: Vec<ManifestFile>,
    pub apply_overrides: bool,
}

impl ManifestRequest {
    /// Deterministic SHA-256 digest of the request contents.
    ///
    /// Two requests describing the same build (same strategy, range, file
    /// set, and overrides decision) share a digest even when their job ids
    /// differ. Used for logging and audit.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.project_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.strategy.name().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.base_sha.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.head_sha.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        for file in &self.files {
            hasher.update(file.path.as_bytes());
            hasher.update(b"\x01");
            hasher.update(file.status.label().as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(if self.apply_overrides { b"1" } else { b"0" });
        hex::encode(hasher.finalize())
    }
}

/// Acknowledgement returned by the build submission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Echoes the caller-supplied job id.
    pub job_id: String,
    pub accepted_at: chrono::DateTime<chrono::Utc>,
}
