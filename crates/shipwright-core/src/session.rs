//! Build session: the operator-driven pipeline state machine.
//!
//! `Config → Files → Preview (skipped for Manual) → Summary → Submitted`.
//!
//! The session is the single owner of all mutable engine state: inputs,
//! the authoritative change list, the canonical and filtered forests, the
//! selection, and the preview. Any change to project, branch, strategy,
//! or selected commit atomically discards downstream state: selection
//! and preview are reset visibly, never partially reconciled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipwright_providers::{
    BuildStrategy, BuildSubmitter, ChangeEntry, ChangeStatus, CommitRef, GitDataProvider,
    OverrideFile, OverrideProvider, SubmitReceipt,
};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::manifest;
use crate::preview::{preview_enabled, PreviewState};
use crate::selection::{FolderState, SelectionSet};
use crate::strategy::{resolve, ResolvedInputs};
use crate::tree::{build_tree, filter_tree, find, TreeNode};

/// Pipeline step. `Submitted` is terminal for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStep {
    Config,
    Files,
    Preview,
    Summary,
    Submitted,
}

impl BuildStep {
    pub fn name(&self) -> &'static str {
        match self {
            BuildStep::Config => "config",
            BuildStep::Files => "files",
            BuildStep::Preview => "preview",
            BuildStep::Summary => "summary",
            BuildStep::Submitted => "submitted",
        }
    }
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A step transition with its timestamp. The event log replaces ad hoc
/// mutable timing cells: elapsed times are derived from entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub step: BuildStep,
    pub at: DateTime<Utc>,
}

/// Operator session assembling one build manifest.
pub struct BuildSession {
    git: Arc<dyn GitDataProvider>,
    submitter: Arc<dyn BuildSubmitter>,
    overrides: Option<Arc<dyn OverrideProvider>>,

    step: BuildStep,
    events: Vec<SessionEvent>,

    project_id: Option<String>,
    branch: Option<String>,
    strategy: BuildStrategy,
    commits: Vec<CommitRef>,
    selected_commit: Option<String>,

    resolved: Option<ResolvedInputs>,
    entries: Vec<ChangeEntry>,
    forest: Vec<TreeNode>,
    files_loaded: bool,

    filter: Option<String>,
    filtered: Option<Vec<TreeNode>>,

    selection: SelectionSet,
    preview_base: Option<String>,
    preview: PreviewState,

    apply_overrides: bool,
}

impl BuildSession {
    pub fn new(git: Arc<dyn GitDataProvider>, submitter: Arc<dyn BuildSubmitter>) -> Self {
        let mut session = Self {
            git,
            submitter,
            overrides: None,
            step: BuildStep::Config,
            events: Vec::new(),
            project_id: None,
            branch: None,
            strategy: BuildStrategy::Full,
            commits: Vec::new(),
            selected_commit: None,
            resolved: None,
            entries: Vec::new(),
            forest: Vec::new(),
            files_loaded: false,
            filter: None,
            filtered: None,
            selection: SelectionSet::new(),
            preview_base: None,
            preview: PreviewState::new(),
            apply_overrides: false,
        };
        session.record_step(BuildStep::Config);
        session
    }

    /// Attach an environment override provider.
    pub fn with_override_provider(mut self, provider: Arc<dyn OverrideProvider>) -> Self {
        self.overrides = Some(provider);
        self
    }

    // -----------------------------------------------------------------
    // Inputs. Every setter discards downstream state wholesale.
    // -----------------------------------------------------------------

    pub fn set_project(&mut self, project_id: impl Into<String>) {
        self.project_id = Some(project_id.into());
        self.branch = None;
        self.commits.clear();
        self.selected_commit = None;
        self.reset_downstream();
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.branch = Some(branch.into());
        self.commits.clear();
        self.selected_commit = None;
        self.reset_downstream();
    }

    pub fn set_strategy(&mut self, strategy: BuildStrategy) {
        self.strategy = strategy;
        self.selected_commit = None;
        self.reset_downstream();
    }

    /// Choose the commit for the SingleCommit strategy.
    pub fn select_commit(&mut self, sha: impl Into<String>) {
        self.selected_commit = Some(sha.into());
        self.reset_downstream();
    }

    /// Discard everything derived from the inputs: resolved range,
    /// entries, forests, selection, preview. Returns the pipeline to
    /// Config. StateInconsistency is resolved here, unconditionally.
    fn reset_downstream(&mut self) {
        self.resolved = None;
        self.entries.clear();
        self.forest.clear();
        self.files_loaded = false;
        self.filter = None;
        self.filtered = None;
        self.selection.clear();
        self.preview_base = None;
        self.preview.clear();
        if self.step != BuildStep::Config {
            self.enter_step(BuildStep::Config);
        }
    }

    // -----------------------------------------------------------------
    // Data loading
    // -----------------------------------------------------------------

    fn require_project(&self) -> EngineResult<&str> {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EngineError::validation("no project selected"))
    }

    fn require_branch(&self) -> EngineResult<&str> {
        self.branch
            .as_deref()
            .ok_or_else(|| EngineError::validation("no branch selected"))
    }

    pub async fn load_branches(&self) -> EngineResult<Vec<String>> {
        let project = self.require_project()?;
        Ok(self.git.list_branches(project).await?)
    }

    /// Fetch the commit list for the chosen branch, newest first.
    pub async fn load_commits(&mut self) -> EngineResult<()> {
        let project = self.require_project()?.to_string();
        let branch = self.require_branch()?.to_string();
        self.commits = self.git.list_commits(&project, &branch).await?;
        info!(branch = %branch, commits = self.commits.len(), "loaded history");
        Ok(())
    }

    /// Resolve the strategy and fetch the authoritative file list,
    /// rebuilding the canonical forest and resetting the selection.
    pub async fn load_files(&mut self) -> EngineResult<()> {
        let project = self.require_project()?.to_string();
        let resolved = resolve(self.strategy, &self.commits, self.selected_commit.as_deref())?;

        let entries = match &resolved {
            ResolvedInputs::CommitRange { base, head } => {
                self.git.diff(&project, base, head).await?
            }
            ResolvedInputs::FullListing => {
                let branch = self.require_branch()?.to_string();
                self.git
                    .list_tree(&project, &branch)
                    .await?
                    .into_iter()
                    .map(|path| ChangeEntry::new(path, ChangeStatus::Unmodified))
                    .collect()
            }
        };

        self.forest = build_tree(&entries);
        self.entries = entries;
        self.resolved = Some(resolved);
        self.files_loaded = true;
        self.filter = None;
        self.filtered = None;
        self.selection.clear();
        self.preview_base = None;
        self.preview.clear();
        info!(
            strategy = %self.strategy,
            files = self.entries.len(),
            "loaded authoritative file list"
        );
        Ok(())
    }

    /// List environment overrides for operator review. The engine never
    /// applies override content; it only forwards `apply_overrides`.
    pub async fn list_overrides(&self, environment: &str) -> EngineResult<Vec<OverrideFile>> {
        match &self.overrides {
            Some(provider) => Ok(provider.list_overrides(environment).await?),
            None => Ok(Vec::new()),
        }
    }

    // -----------------------------------------------------------------
    // Selection and display filter
    // -----------------------------------------------------------------

    /// Flip one leaf path. The path must exist in the canonical forest.
    pub fn toggle_file(&mut self, path: &str) -> EngineResult<bool> {
        match find(&self.forest, path) {
            Some(node) if node.is_leaf => Ok(self.selection.toggle_file(path)),
            _ => Err(EngineError::validation(format!(
                "{path} is not a file in the current tree"
            ))),
        }
    }

    /// Toggle a folder against the canonical forest (never the filtered
    /// view), with all-or-none semantics.
    pub fn toggle_folder(&mut self, folder_path: &str) {
        self.selection.toggle_folder(folder_path, &self.forest);
    }

    pub fn folder_state(&self, folder_path: &str) -> FolderState {
        self.selection.folder_state(folder_path, &self.forest)
    }

    /// Set or clear the display filter. Only the display projection
    /// changes; canonical forest and selection are untouched.
    pub fn set_filter(&mut self, query: Option<&str>) {
        match query {
            Some(q) if !q.is_empty() => {
                self.filtered = Some(filter_tree(&self.forest, q));
                self.filter = Some(q.to_string());
            }
            _ => {
                self.filtered = None;
                self.filter = None;
            }
        }
    }

    /// The forest the operator currently sees: filtered when a filter is
    /// active, canonical otherwise.
    pub fn visible_forest(&self) -> &[TreeNode] {
        self.filtered.as_deref().unwrap_or(&self.forest)
    }

    // -----------------------------------------------------------------
    // Preview
    // -----------------------------------------------------------------

    /// Point the preview at a different base commit. Inspection only:
    /// selection and the committed range are untouched.
    pub fn set_preview_base(&mut self, sha: impl Into<String>) {
        self.preview_base = Some(sha.into());
    }

    pub fn preview_enabled(&self) -> bool {
        preview_enabled(
            self.strategy,
            self.preview_base.as_deref(),
            self.head_sha(),
            &self.selection,
        )
    }

    /// Fetch the preview diff, scoped to the selected paths.
    pub async fn load_preview(&mut self) -> EngineResult<()> {
        if !self.preview_enabled() {
            return Err(EngineError::validation(
                "preview requires a non-Manual strategy, a preview base, a resolved head, and a non-empty selection",
            ));
        }
        let project = self.require_project()?.to_string();
        // enabled() checked both shas above
        let (base, head) = match (self.preview_base.clone(), self.head_sha()) {
            (Some(base), Some(head)) => (base, head.to_string()),
            _ => return Err(EngineError::validation("preview range is not set")),
        };
        let paths = self.selection.paths();
        let entries = self.git.diff_scoped(&project, &base, &head, &paths).await?;
        self.preview.apply(base, entries);
        Ok(())
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    // -----------------------------------------------------------------
    // Step transitions
    // -----------------------------------------------------------------

    fn invalid(&self, to: BuildStep) -> EngineError {
        EngineError::InvalidTransition {
            from: self.step.to_string(),
            to: to.to_string(),
        }
    }

    fn enter_step(&mut self, step: BuildStep) {
        info!(from = %self.step, to = %step, "pipeline step");
        self.step = step;
        self.record_step(step);
    }

    fn record_step(&mut self, step: BuildStep) {
        self.events.push(SessionEvent {
            step,
            at: Utc::now(),
        });
    }

    /// Move to the next step. Submission is explicit via [`submit`],
    /// never an `advance` side effect.
    ///
    /// [`submit`]: BuildSession::submit
    pub fn advance(&mut self) -> EngineResult<BuildStep> {
        let next = match self.step {
            BuildStep::Config => {
                if !self.files_loaded {
                    return Err(EngineError::validation(
                        "load the file list before entering the files step",
                    ));
                }
                BuildStep::Files
            }
            BuildStep::Files => {
                if self.selection.is_empty() {
                    return Err(EngineError::validation(
                        "select at least one file before continuing",
                    ));
                }
                if self.strategy == BuildStrategy::Manual {
                    BuildStep::Summary
                } else {
                    BuildStep::Preview
                }
            }
            BuildStep::Preview => BuildStep::Summary,
            BuildStep::Summary => return Err(self.invalid(BuildStep::Submitted)),
            BuildStep::Submitted => return Err(self.invalid(BuildStep::Submitted)),
        };
        self.enter_step(next);
        Ok(next)
    }

    /// Move to the previous step. Submitted is terminal.
    pub fn retreat(&mut self) -> EngineResult<BuildStep> {
        let previous = match self.step {
            BuildStep::Config | BuildStep::Submitted => {
                return Err(self.invalid(BuildStep::Config))
            }
            BuildStep::Files => BuildStep::Config,
            BuildStep::Preview => BuildStep::Files,
            BuildStep::Summary => {
                if self.strategy == BuildStrategy::Manual {
                    BuildStep::Files
                } else {
                    BuildStep::Preview
                }
            }
        };
        self.enter_step(previous);
        Ok(previous)
    }

    pub fn set_apply_overrides(&mut self, apply: bool) {
        self.apply_overrides = apply;
    }

    /// Assemble the manifest and hand it to the build submission service.
    ///
    /// `job_id` is caller-generated (see [`manifest::new_job_id`]); passing
    /// the same id again is an explicit re-submission. On success the
    /// session enters the terminal Submitted step.
    pub async fn submit(&mut self, job_id: impl Into<String>) -> EngineResult<SubmitReceipt> {
        if self.step != BuildStep::Summary {
            return Err(self.invalid(BuildStep::Submitted));
        }
        let request = manifest::assemble(
            job_id,
            self.project_id.as_deref(),
            self.strategy,
            self.base_sha(),
            self.head_sha(),
            &self.entries,
            &self.selection,
            self.apply_overrides,
        )?;
        let receipt = self.submitter.submit(&request).await?;
        self.enter_step(BuildStep::Submitted);
        info!(job_id = %receipt.job_id, "manifest submitted");
        Ok(receipt)
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn step(&self) -> BuildStep {
        self.step
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn strategy(&self) -> BuildStrategy {
        self.strategy
    }

    pub fn commits(&self) -> &[CommitRef] {
        &self.commits
    }

    pub fn selected_commit(&self) -> Option<&str> {
        self.selected_commit.as_deref()
    }

    pub fn base_sha(&self) -> Option<&str> {
        self.resolved.as_ref().and_then(|r| r.base_sha())
    }

    pub fn head_sha(&self) -> Option<&str> {
        self.resolved.as_ref().and_then(|r| r.head_sha())
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn forest(&self) -> &[TreeNode] {
        &self.forest
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn preview_base(&self) -> Option<&str> {
        self.preview_base.as_deref()
    }

    pub fn apply_overrides(&self) -> bool {
        self.apply_overrides
    }
}
