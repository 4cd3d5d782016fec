//! Hierarchical file tree construction and traversal.
//!
//! `build_tree` is a pure transform from a flat change list to an
//! immutable node forest. Construction walks an internal arena keyed by
//! path prefix; once the forest is returned no node is ever mutated.
//! Rebuilds replace the forest wholesale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shipwright_providers::{ChangeEntry, ChangeStatus};

/// One node in the file hierarchy.
///
/// Invariants:
/// - the leaf-path set of a forest built from list `L` equals the path
///   set of `L`;
/// - a node has children iff its path is a strict prefix of some leaf
///   path. When that path is itself a changed file (a file replaced by a
///   directory within one diff) the node is a leaf and a parent at once;
/// - child order is first-seen order, deterministic given input order;
/// - `status` is present iff the node is a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Last path segment.
    pub name: String,
    /// Full repository-relative path.
    pub path: String,
    pub is_leaf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ChangeStatus>,
    pub children: Vec<TreeNode>,
}

struct NodeBuilder {
    name: String,
    path: String,
    is_leaf: bool,
    status: Option<ChangeStatus>,
    children: Vec<usize>,
}

/// Build a node forest from a flat change list.
///
/// O(total path segments). Intermediate directory nodes are created on
/// first sight and reused for every later entry sharing the prefix. A
/// duplicate path keeps its first entry's status. A path appearing both
/// as a file and as a directory prefix (git reports this when a file is
/// replaced by a directory) yields one node that is both a leaf and a
/// parent.
pub fn build_tree(entries: &[ChangeEntry]) -> Vec<TreeNode> {
    let mut arena: Vec<NodeBuilder> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();

    for entry in entries {
        let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }

        let mut parent: Option<usize> = None;
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            let is_last = i == segments.len() - 1;

            let idx = match by_path.get(&prefix) {
                Some(&idx) => {
                    // the path was seen as a directory prefix first
                    if is_last && !arena[idx].is_leaf {
                        arena[idx].is_leaf = true;
                        arena[idx].status = Some(entry.status);
                    }
                    idx
                }
                None => {
                    let idx = arena.len();
                    arena.push(NodeBuilder {
                        name: segment.to_string(),
                        path: prefix.clone(),
                        is_leaf: is_last,
                        status: if is_last { Some(entry.status) } else { None },
                        children: Vec::new(),
                    });
                    by_path.insert(prefix.clone(), idx);
                    match parent {
                        Some(p) => arena[p].children.push(idx),
                        None => roots.push(idx),
                    }
                    idx
                }
            };
            parent = Some(idx);
        }
    }

    roots.iter().map(|&r| freeze(&arena, r)).collect()
}

fn freeze(arena: &[NodeBuilder], idx: usize) -> TreeNode {
    let builder = &arena[idx];
    TreeNode {
        name: builder.name.clone(),
        path: builder.path.clone(),
        is_leaf: builder.is_leaf,
        status: builder.status,
        children: builder.children.iter().map(|&c| freeze(arena, c)).collect(),
    }
}

/// Every leaf path in the forest, preorder.
pub fn leaf_paths(forest: &[TreeNode]) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaves(forest, &mut paths);
    paths
}

fn collect_leaves(nodes: &[TreeNode], out: &mut Vec<String>) {
    for node in nodes {
        if node.is_leaf {
            out.push(node.path.clone());
        }
        collect_leaves(&node.children, out);
    }
}

/// Find the node with the exact given path.
pub fn find<'a>(forest: &'a [TreeNode], path: &str) -> Option<&'a TreeNode> {
    for node in forest {
        if node.path == path {
            return Some(node);
        }
        // Descend only where the path can live.
        if path.starts_with(&node.path) && path.as_bytes().get(node.path.len()) == Some(&b'/') {
            return find(&node.children, path);
        }
    }
    None
}

/// All leaf paths at or under `folder_path`.
///
/// Always evaluated against the canonical forest, never a filtered view.
/// A leaf path returns itself (plus any leaves under it, for a node that
/// is both a file and a directory); an unknown path returns nothing.
pub fn leaves_under(forest: &[TreeNode], folder_path: &str) -> Vec<String> {
    match find(forest, folder_path) {
        Some(node) => {
            let mut paths = Vec::new();
            if node.is_leaf {
                paths.push(node.path.clone());
            }
            collect_leaves(&node.children, &mut paths);
            paths
        }
        None => Vec::new(),
    }
}

/// Display projection: keep leaves whose path contains `query`
/// (case-insensitive) and the directories leading to them.
///
/// Produces a new forest; the canonical forest is never filtered in
/// place. Bulk selection operations must not run against this view.
pub fn filter_tree(forest: &[TreeNode], query: &str) -> Vec<TreeNode> {
    if query.is_empty() {
        return forest.to_vec();
    }
    let needle = query.to_lowercase();
    filter_nodes(forest, &needle)
}

fn filter_nodes(nodes: &[TreeNode], needle: &str) -> Vec<TreeNode> {
    nodes
        .iter()
        .filter_map(|node| {
            let children = filter_nodes(&node.children, needle);
            let self_matches = node.is_leaf && node.path.to_lowercase().contains(needle);
            (self_matches || !children.is_empty()).then(|| TreeNode {
                name: node.name.clone(),
                path: node.path.clone(),
                is_leaf: self_matches,
                status: if self_matches { node.status } else { None },
                children,
            })
        })
        .collect()
}
