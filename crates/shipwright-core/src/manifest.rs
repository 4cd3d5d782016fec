//! Final manifest assembly.
//!
//! Merges the authoritative file list, the current selection, and the
//! overrides decision into an unambiguous build request. Statuses are
//! looked up in the authoritative change list, never in the tree: the
//! tree may have been rebuilt from a filtered view, the list cannot.

use std::collections::HashMap;

use shipwright_providers::{BuildStrategy, ChangeEntry, ManifestFile, ManifestRequest};
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::selection::SelectionSet;

/// Generate a fresh caller-side job id.
pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Assemble the final manifest request.
///
/// Fails with a validation error if no project is chosen, the selection
/// is empty, or a selected path is missing from the authoritative list
/// (a state inconsistency made visible rather than silently dropped).
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    job_id: impl Into<String>,
    project_id: Option<&str>,
    strategy: BuildStrategy,
    base_sha: Option<&str>,
    head_sha: Option<&str>,
    authoritative: &[ChangeEntry],
    selection: &SelectionSet,
    apply_overrides: bool,
) -> EngineResult<ManifestRequest> {
    let project_id = match project_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(EngineError::validation("no project selected")),
    };
    if selection.is_empty() {
        return Err(EngineError::validation("selection is empty"));
    }

    let by_path: HashMap<&str, &ChangeEntry> =
        authoritative.iter().map(|e| (e.path.as_str(), e)).collect();

    let mut files = Vec::with_capacity(selection.len());
    for path in selection.paths() {
        let entry = by_path.get(path.as_str()).ok_or_else(|| {
            EngineError::validation(format!(
                "selected path {path} is not in the authoritative file list"
            ))
        })?;
        files.push(ManifestFile {
            path,
            status: entry.status,
        });
    }

    let request = ManifestRequest {
        job_id: job_id.into(),
        project_id: project_id.to_string(),
        strategy,
        base_sha: base_sha.map(str::to_string),
        head_sha: head_sha.map(str::to_string),
        files,
        apply_overrides,
    };
    info!(
        job_id = %request.job_id,
        digest = %request.digest(),
        files = request.files.len(),
        "assembled manifest"
    );
    Ok(request)
}
