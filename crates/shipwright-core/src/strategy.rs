//! Commit range resolution per build strategy.
//!
//! A pure function over the newest-first commit list. Re-run wholesale on
//! every change of strategy, branch, or selected commit; stale results
//! are replaced, never patched.

use serde::{Deserialize, Serialize};
use shipwright_providers::{BuildStrategy, CommitRef};

use crate::error::{EngineError, EngineResult};

/// What the strategy resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedInputs {
    /// Diff `base..head`; the authoritative file list is that diff.
    CommitRange { base: String, head: String },
    /// No commit range; the authoritative file list is the full tree at
    /// branch head, every entry marked unmodified. Preview is disabled.
    FullListing,
}

impl ResolvedInputs {
    pub fn base_sha(&self) -> Option<&str> {
        match self {
            ResolvedInputs::CommitRange { base, .. } => Some(base),
            ResolvedInputs::FullListing => None,
        }
    }

    pub fn head_sha(&self) -> Option<&str> {
        match self {
            ResolvedInputs::CommitRange { head, .. } => Some(head),
            ResolvedInputs::FullListing => None,
        }
    }
}

/// Resolve the commit range for a strategy.
///
/// `commits` is newest-first. `selected` is the chosen commit sha,
/// required for `SingleCommit` and ignored otherwise.
///
/// For `SingleCommit`, the base is the commit immediately after the
/// selected one in displayed order (its parent). Selecting the oldest
/// loaded commit is an explicit `NoParentCommit` error: diffing a commit
/// against itself would silently yield an empty change set.
pub fn resolve(
    strategy: BuildStrategy,
    commits: &[CommitRef],
    selected: Option<&str>,
) -> EngineResult<ResolvedInputs> {
    match strategy {
        BuildStrategy::Full => match (commits.first(), commits.last()) {
            (Some(head), Some(base)) => Ok(ResolvedInputs::CommitRange {
                base: base.sha.clone(),
                head: head.sha.clone(),
            }),
            _ => Err(EngineError::validation("no commits loaded")),
        },
        BuildStrategy::SingleCommit => {
            let sha = selected
                .ok_or_else(|| EngineError::validation("no commit selected"))?;
            let position = commits
                .iter()
                .position(|c| c.sha == sha)
                .ok_or_else(|| {
                    EngineError::validation(format!("selected commit {sha} is not in the loaded history"))
                })?;
            match commits.get(position + 1) {
                Some(parent) => Ok(ResolvedInputs::CommitRange {
                    base: parent.sha.clone(),
                    head: sha.to_string(),
                }),
                None => Err(EngineError::NoParentCommit {
                    sha: sha.to_string(),
                }),
            }
        }
        BuildStrategy::Manual => Ok(ResolvedInputs::FullListing),
    }
}
