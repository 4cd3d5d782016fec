//! Preview reconciliation: an inspection diff range independent of the
//! committed build inputs.
//!
//! The operator may point the preview at any base commit to review an
//! alternate range. The resulting entries and tree are read-only side
//! state; applying or clearing a preview never touches the selection or
//! the committed (base, head) pair.

use shipwright_providers::{BuildStrategy, ChangeEntry};

use crate::patch::PatchView;
use crate::selection::SelectionSet;
use crate::tree::{build_tree, TreeNode};

/// Secondary, read-only diff state scoped to the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    base: Option<String>,
    entries: Vec<ChangeEntry>,
    forest: Vec<TreeNode>,
}

impl PreviewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn forest(&self) -> &[TreeNode] {
        &self.forest
    }

    pub fn is_loaded(&self) -> bool {
        self.base.is_some()
    }

    /// Replace the preview with a freshly fetched scoped diff.
    pub fn apply(&mut self, base: impl Into<String>, entries: Vec<ChangeEntry>) {
        self.forest = build_tree(&entries);
        self.entries = entries;
        self.base = Some(base.into());
    }

    /// Per-file render inputs for the preview pane.
    ///
    /// A file whose patch text does not parse falls back to raw display;
    /// the failure never affects other files. Entries without patch text
    /// (e.g. binary changes reported without content) are skipped.
    pub fn patch_views(&self) -> Vec<(String, PatchView)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .patch
                    .as_deref()
                    .map(|patch| (entry.path.clone(), PatchView::from_patch(patch)))
            })
            .collect()
    }

    /// Discard all preview state. Happens on every dependency change.
    pub fn clear(&mut self) {
        self.base = None;
        self.entries.clear();
        self.forest.clear();
    }
}

/// Whether a preview fetch is allowed.
///
/// Requires: strategy is not Manual (there is no diff to preview for a
/// static listing), a preview base and a committed head are both set, and
/// at least one file is selected (the preview is scoped to the selection,
/// not the whole diff).
pub fn preview_enabled(
    strategy: BuildStrategy,
    preview_base: Option<&str>,
    head_sha: Option<&str>,
    selection: &SelectionSet,
) -> bool {
    strategy != BuildStrategy::Manual
        && preview_base.is_some()
        && head_sha.is_some()
        && !selection.is_empty()
}
