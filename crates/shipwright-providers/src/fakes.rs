//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryGitProvider`, `MemoryBuildSubmitter`, and
//! `MemoryOverrideProvider` that satisfy the trait contracts without any
//! external dependencies. The git fake is scripted: tests register
//! branches, commits, trees, and diffs up front, and can assert on fetch
//! counters to verify caching behaviour.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{DataError, DataResult};
use crate::traits::{BuildSubmitter, GitDataProvider, OverrideProvider};
use crate::types::{
    ChangeEntry, CommitRef, ManifestRequest, OverrideFile, SubmitReceipt,
};

// ---------------------------------------------------------------------------
// MemoryGitProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GitScript {
    /// project -> branch names
    branches: HashMap<String, Vec<String>>,
    /// (project, branch) -> commits, newest-first in insertion order
    commits: HashMap<(String, String), Vec<CommitRef>>,
    /// (project, branch) -> full file listing
    trees: HashMap<(String, String), Vec<String>>,
    /// (project, base, head) -> change entries
    diffs: HashMap<(String, String, String), Vec<ChangeEntry>>,
}

#[derive(Debug, Default)]
struct FetchCounters {
    branches: u32,
    commits: u32,
    trees: u32,
    diffs: u32,
    scoped_diffs: u32,
}

/// Scripted in-memory git data source.
#[derive(Debug, Default)]
pub struct MemoryGitProvider {
    script: Mutex<GitScript>,
    counters: Mutex<FetchCounters>,
}

impl MemoryGitProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_branch(&self, project: &str, branch: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .branches
            .entry(project.to_string())
            .or_default()
            .push(branch.to_string());
    }

    /// Register a commit. Call in newest-first order, matching how a real
    /// provider returns history.
    pub fn add_commit(&self, project: &str, branch: &str, sha: &str, message: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .commits
            .entry((project.to_string(), branch.to_string()))
            .or_default()
            .push(CommitRef::new(sha, message));
    }

    pub fn set_tree(&self, project: &str, branch: &str, paths: Vec<&str>) {
        let mut script = self.script.lock().unwrap();
        script.trees.insert(
            (project.to_string(), branch.to_string()),
            paths.into_iter().map(str::to_string).collect(),
        );
    }

    pub fn set_diff(&self, project: &str, base: &str, head: &str, entries: Vec<ChangeEntry>) {
        let mut script = self.script.lock().unwrap();
        script.diffs.insert(
            (project.to_string(), base.to_string(), head.to_string()),
            entries,
        );
    }

    pub fn branch_fetches(&self) -> u32 {
        self.counters.lock().unwrap().branches
    }

    pub fn commit_fetches(&self) -> u32 {
        self.counters.lock().unwrap().commits
    }

    pub fn tree_fetches(&self) -> u32 {
        self.counters.lock().unwrap().trees
    }

    pub fn diff_fetches(&self) -> u32 {
        self.counters.lock().unwrap().diffs
    }

    pub fn scoped_diff_fetches(&self) -> u32 {
        self.counters.lock().unwrap().scoped_diffs
    }
}

#[async_trait]
impl GitDataProvider for MemoryGitProvider {
    async fn list_branches(&self, project_id: &str) -> DataResult<Vec<String>> {
        self.counters.lock().unwrap().branches += 1;
        let script = self.script.lock().unwrap();
        script
            .branches
            .get(project_id)
            .cloned()
            .ok_or_else(|| DataError::CommandFailed(format!("unknown project: {project_id}")))
    }

    async fn list_commits(&self, project_id: &str, branch: &str) -> DataResult<Vec<CommitRef>> {
        self.counters.lock().unwrap().commits += 1;
        let script = self.script.lock().unwrap();
        script
            .commits
            .get(&(project_id.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| DataError::BranchNotFound(branch.to_string()))
    }

    async fn list_tree(&self, project_id: &str, branch: &str) -> DataResult<Vec<String>> {
        self.counters.lock().unwrap().trees += 1;
        let script = self.script.lock().unwrap();
        script
            .trees
            .get(&(project_id.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| DataError::BranchNotFound(branch.to_string()))
    }

    async fn diff(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
    ) -> DataResult<Vec<ChangeEntry>> {
        self.counters.lock().unwrap().diffs += 1;
        let script = self.script.lock().unwrap();
        script
            .diffs
            .get(&(project_id.to_string(), base.to_string(), head.to_string()))
            .cloned()
            .ok_or_else(|| DataError::CommitNotFound(format!("{base}..{head}")))
    }

    async fn diff_scoped(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> DataResult<Vec<ChangeEntry>> {
        self.counters.lock().unwrap().scoped_diffs += 1;
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let script = self.script.lock().unwrap();
        let entries = script
            .diffs
            .get(&(project_id.to_string(), base.to_string(), head.to_string()))
            .cloned()
            .ok_or_else(|| DataError::CommitNotFound(format!("{base}..{head}")))?;
        Ok(entries
            .into_iter()
            .filter(|e| paths.contains(&e.path))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildSubmitter
// ---------------------------------------------------------------------------

/// Records every submitted manifest for later assertions.
#[derive(Debug, Default)]
pub struct MemoryBuildSubmitter {
    submitted: Mutex<Vec<ManifestRequest>>,
}

impl MemoryBuildSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<ManifestRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildSubmitter for MemoryBuildSubmitter {
    async fn submit(&self, request: &ManifestRequest) -> DataResult<SubmitReceipt> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(SubmitReceipt {
            job_id: request.job_id.clone(),
            accepted_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryOverrideProvider
// ---------------------------------------------------------------------------

/// Scripted environment override listings.
#[derive(Debug, Default)]
pub struct MemoryOverrideProvider {
    overrides: Mutex<HashMap<String, Vec<OverrideFile>>>,
}

impl MemoryOverrideProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_overrides(&self, environment: &str, files: Vec<OverrideFile>) {
        let mut overrides = self.overrides.lock().unwrap();
        overrides.insert(environment.to_string(), files);
    }
}

#[async_trait]
impl OverrideProvider for MemoryOverrideProvider {
    async fn list_overrides(&self, environment: &str) -> DataResult<Vec<OverrideFile>> {
        let overrides = self.overrides.lock().unwrap();
        Ok(overrides.get(environment).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildStrategy, ChangeStatus, ManifestFile};

    #[tokio::test]
    async fn scripted_provider_round_trip() {
        let provider = MemoryGitProvider::new();
        provider.add_branch("proj", "main");
        provider.add_commit("proj", "main", "c2", "newer");
        provider.add_commit("proj", "main", "c1", "older");
        provider.set_tree("proj", "main", vec!["x.proxy", "y.pipeline"]);
        provider.set_diff(
            "proj",
            "c1",
            "c2",
            vec![ChangeEntry::new("x.proxy", ChangeStatus::Modified)],
        );

        assert_eq!(provider.list_branches("proj").await.unwrap(), vec!["main"]);
        let commits = provider.list_commits("proj", "main").await.unwrap();
        assert_eq!(commits[0].sha, "c2");
        assert_eq!(
            provider.list_tree("proj", "main").await.unwrap(),
            vec!["x.proxy", "y.pipeline"]
        );
        let diff = provider.diff("proj", "c1", "c2").await.unwrap();
        assert_eq!(diff.len(), 1);
    }

    #[tokio::test]
    async fn scoped_diff_filters_to_requested_paths() {
        let provider = MemoryGitProvider::new();
        provider.set_diff(
            "proj",
            "c1",
            "c2",
            vec![
                ChangeEntry::new("keep.xml", ChangeStatus::Modified),
                ChangeEntry::new("skip.xml", ChangeStatus::Added),
            ],
        );

        let scoped = provider
            .diff_scoped("proj", "c1", "c2", &["keep.xml".to_string()])
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].path, "keep.xml");
    }

    #[tokio::test]
    async fn submitter_records_requests_and_echoes_job_id() {
        let submitter = MemoryBuildSubmitter::new();
        let request = ManifestRequest {
            job_id: "job-42".to_string(),
            project_id: "proj".to_string(),
            strategy: BuildStrategy::Manual,
            base_sha: None,
            head_sha: None,
            files: vec![ManifestFile {
                path: "x.proxy".to_string(),
                status: ChangeStatus::Unmodified,
            }],
            apply_overrides: true,
        };

        let receipt = submitter.submit(&request).await.unwrap();
        assert_eq!(receipt.job_id, "job-42");
        assert_eq!(submitter.submitted().len(), 1);
        assert_eq!(submitter.submitted()[0].project_id, "proj");
    }

    #[tokio::test]
    async fn override_provider_defaults_to_empty() {
        let provider = MemoryOverrideProvider::new();
        assert!(provider.list_overrides("staging").await.unwrap().is_empty());

        provider.set_overrides(
            "staging",
            vec![OverrideFile {
                file_path: "conf/endpoints.xml".to_string(),
                content: "<endpoint env=\"staging\"/>".to_string(),
            }],
        );
        let files = provider.list_overrides("staging").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_path, "conf/endpoints.xml");
    }
}
