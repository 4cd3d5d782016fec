//! Leaf path selection with tri-state folder derivation.
//!
//! Membership is hash-set backed; folder indicators are derived on demand
//! and never stored. Bulk folder operations always walk the canonical
//! forest so an active display filter can never strand selected files.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{leaves_under, TreeNode};

/// Derived selection summary for a directory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderState {
    /// No leaf under the folder is selected.
    None,
    /// Some but not all leaves are selected.
    Partial,
    /// Every leaf under the folder is selected (and there is at least one).
    All,
}

/// The set of currently chosen leaf paths.
///
/// Always a subset of the canonical forest's leaves. Cleared wholesale
/// whenever the source change list is replaced; never reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: HashSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    /// Selected paths in sorted order, for deterministic downstream use.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.selected.iter().cloned().collect();
        paths.sort();
        paths
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Flip membership of a single leaf path. Returns the new membership.
    pub fn toggle_file(&mut self, path: &str) -> bool {
        if self.selected.remove(path) {
            debug!(path, "deselected file");
            false
        } else {
            self.selected.insert(path.to_string());
            debug!(path, "selected file");
            true
        }
    }

    /// Toggle every leaf under `folder_path` in the canonical forest.
    ///
    /// All-or-none semantics: if every collected leaf is currently
    /// selected, all are deselected; otherwise all are selected. Calling
    /// twice with no intervening change restores the original set.
    pub fn toggle_folder(&mut self, folder_path: &str, canonical: &[TreeNode]) {
        let leaves = leaves_under(canonical, folder_path);
        if leaves.is_empty() {
            return;
        }
        let all_selected = leaves.iter().all(|p| self.selected.contains(p));
        if all_selected {
            for path in &leaves {
                self.selected.remove(path);
            }
            debug!(folder = folder_path, count = leaves.len(), "deselected folder");
        } else {
            for path in leaves.iter() {
                self.selected.insert(path.clone());
            }
            debug!(folder = folder_path, count = leaves.len(), "selected folder");
        }
    }

    /// Derive the tri-state indicator for a folder. Never stored.
    pub fn folder_state(&self, folder_path: &str, canonical: &[TreeNode]) -> FolderState {
        let leaves = leaves_under(canonical, folder_path);
        if leaves.is_empty() {
            return FolderState::None;
        }
        let selected = leaves.iter().filter(|p| self.selected.contains(*p)).count();
        if selected == 0 {
            FolderState::None
        } else if selected == leaves.len() {
            FolderState::All
        } else {
            FolderState::Partial
        }
    }
}
