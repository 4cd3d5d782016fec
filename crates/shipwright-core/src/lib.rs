//! Shipwright Core Library
//!
//! Build manifest resolution: given a git history and a selection
//! strategy, deterministically resolve a commit range, present the
//! changed-file set as a navigable hierarchy with consistent multi-select
//! semantics, preview an independently chosen diff range, and assemble an
//! unambiguous build request.

pub mod error;
pub mod manifest;
pub mod patch;
pub mod preview;
pub mod selection;
pub mod session;
pub mod strategy;
pub mod telemetry;
pub mod tree;

pub use error::{DiffParseError, EngineError, EngineResult};
pub use manifest::{assemble, new_job_id};
pub use patch::{parse_patch, Hunk, LineKind, PatchLine, PatchView};
pub use preview::{preview_enabled, PreviewState};
pub use selection::{FolderState, SelectionSet};
pub use session::{BuildSession, BuildStep, SessionEvent};
pub use strategy::{resolve, ResolvedInputs};
pub use telemetry::init_tracing;
pub use tree::{build_tree, filter_tree, leaf_paths, leaves_under, TreeNode};

// Re-export the provider layer types callers need alongside the engine.
pub use shipwright_providers::{
    BuildStrategy, ChangeEntry, ChangeStatus, CommitRef, ManifestFile, ManifestRequest,
    OverrideFile, SubmitReceipt,
};

/// Shipwright version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
