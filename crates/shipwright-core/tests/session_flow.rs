//! Integration tests for the build session pipeline with in-memory fakes.

use std::sync::Arc;

use shipwright_core::{
    BuildSession, BuildStep, BuildStrategy, ChangeEntry, ChangeStatus, EngineError, FolderState,
};
use shipwright_providers::fakes::{MemoryBuildSubmitter, MemoryGitProvider, MemoryOverrideProvider};
use shipwright_providers::OverrideFile;

const PROJECT: &str = "esb-gateway";

/// Provider scripted with three commits on main and diffs for the ranges
/// the strategies and the preview can resolve.
fn scripted_provider() -> MemoryGitProvider {
    let git = MemoryGitProvider::new();
    git.add_branch(PROJECT, "main");
    git.add_branch(PROJECT, "release");
    git.add_commit(PROJECT, "main", "c3", "tune throttling policy");
    git.add_commit(PROJECT, "main", "c2", "add invoice pipeline");
    git.add_commit(PROJECT, "main", "c1", "initial import");
    git.set_tree(PROJECT, "main", vec!["x.proxy", "y.pipeline"]);
    git.set_diff(
        PROJECT,
        "c1",
        "c3",
        vec![
            ChangeEntry::new("svc/orders.proxy", ChangeStatus::Modified),
            ChangeEntry::new("svc/invoices.pipeline", ChangeStatus::Added),
            ChangeEntry::new("conf/legacy.xml", ChangeStatus::Deleted),
        ],
    );
    git.set_diff(
        PROJECT,
        "c1",
        "c2",
        vec![ChangeEntry::new(
            "svc/invoices.pipeline",
            ChangeStatus::Added,
        )],
    );
    git.set_diff(
        PROJECT,
        "c2",
        "c3",
        vec![ChangeEntry::new("svc/orders.proxy", ChangeStatus::Modified)],
    );
    git
}

fn session_with(git: Arc<MemoryGitProvider>, submitter: Arc<MemoryBuildSubmitter>) -> BuildSession {
    let mut session = BuildSession::new(git, submitter);
    session.set_project(PROJECT);
    session.set_branch("main");
    session
}

#[tokio::test]
async fn full_strategy_end_to_end() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git.clone(), submitter.clone());

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.expect("load commits");
    assert_eq!(session.commits().len(), 3);

    session.load_files().await.expect("load files");
    assert_eq!(session.base_sha(), Some("c1"));
    assert_eq!(session.head_sha(), Some("c3"));
    assert_eq!(session.entries().len(), 3);

    assert_eq!(session.advance().unwrap(), BuildStep::Files);
    session.toggle_folder("svc");
    assert_eq!(session.selection().len(), 2);
    assert_eq!(session.folder_state("svc"), FolderState::All);

    assert_eq!(session.advance().unwrap(), BuildStep::Preview);
    assert_eq!(session.advance().unwrap(), BuildStep::Summary);

    session.set_apply_overrides(true);
    let receipt = session.submit("job-1").await.expect("submit");
    assert_eq!(receipt.job_id, "job-1");
    assert_eq!(session.step(), BuildStep::Submitted);

    let submitted = submitter.submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.project_id, PROJECT);
    assert_eq!(request.strategy, BuildStrategy::Full);
    assert_eq!(request.base_sha.as_deref(), Some("c1"));
    assert_eq!(request.head_sha.as_deref(), Some("c3"));
    assert!(request.apply_overrides);
    let paths: Vec<&str> = request.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["svc/invoices.pipeline", "svc/orders.proxy"]);
    assert_eq!(request.files[0].status, ChangeStatus::Added);
    assert_eq!(request.files[1].status, ChangeStatus::Modified);
}

#[tokio::test]
async fn single_commit_strategy_resolves_displayed_parent() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::SingleCommit);
    session.load_commits().await.unwrap();
    session.select_commit("c2");
    session.load_files().await.unwrap();

    assert_eq!(session.base_sha(), Some("c1"));
    assert_eq!(session.head_sha(), Some("c2"));
    assert_eq!(session.entries().len(), 1);
    assert_eq!(session.entries()[0].path, "svc/invoices.pipeline");
}

#[tokio::test]
async fn single_commit_oldest_fails_explicitly() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::SingleCommit);
    session.load_commits().await.unwrap();
    session.select_commit("c1");

    let err = session.load_files().await.unwrap_err();
    assert!(
        matches!(err, EngineError::NoParentCommit { ref sha } if sha == "c1"),
        "{err}"
    );
    // the failure leaves the step incomplete, not broken
    assert_eq!(session.step(), BuildStep::Config);
}

#[tokio::test]
async fn manual_strategy_lists_tree_and_skips_preview() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git.clone(), submitter.clone());

    session.set_strategy(BuildStrategy::Manual);
    session.load_files().await.unwrap();

    assert_eq!(session.base_sha(), None);
    assert_eq!(session.head_sha(), None);
    assert_eq!(session.entries().len(), 2);
    assert!(session
        .entries()
        .iter()
        .all(|e| e.status == ChangeStatus::Unmodified));

    session.advance().unwrap();
    session.toggle_file("x.proxy").unwrap();
    assert!(!session.preview_enabled());

    // Files -> Summary directly; Preview is skipped for Manual
    assert_eq!(session.advance().unwrap(), BuildStep::Summary);

    let receipt = session.submit("job-m").await.unwrap();
    assert_eq!(receipt.job_id, "job-m");
    let request = &submitter.submitted()[0];
    assert_eq!(request.files.len(), 1);
    assert_eq!(request.files[0].status, ChangeStatus::Unmodified);
    // no diff was ever fetched
    assert_eq!(git.diff_fetches(), 0);
}

#[tokio::test]
async fn preview_never_disturbs_selection_or_range() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git.clone(), submitter);

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("svc/orders.proxy").unwrap();
    session.advance().unwrap();
    assert_eq!(session.step(), BuildStep::Preview);

    let selection_before = session.selection().paths();

    session.set_preview_base("c2");
    assert!(session.preview_enabled());
    session.load_preview().await.expect("preview fetch");

    // the preview tree is populated from the scoped diff
    assert_eq!(session.preview().entries().len(), 1);
    assert_eq!(session.preview().base(), Some("c2"));
    assert_eq!(git.scoped_diff_fetches(), 1);

    // committed inputs are untouched
    assert_eq!(session.selection().paths(), selection_before);
    assert_eq!(session.base_sha(), Some("c1"));
    assert_eq!(session.head_sha(), Some("c3"));
}

#[tokio::test]
async fn preview_requires_selection() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.set_preview_base("c2");

    assert!(!session.preview_enabled());
    let err = session.load_preview().await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
}

#[tokio::test]
async fn empty_selection_never_reaches_submitted() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter.clone());

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.advance().unwrap();

    // leaving Files requires a non-empty selection
    let err = session.advance().unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert_eq!(session.step(), BuildStep::Files);

    // submitting outside Summary is an invalid transition
    let err = session.submit("job-x").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert!(submitter.submitted().is_empty());
    assert_ne!(session.step(), BuildStep::Submitted);
}

#[tokio::test]
async fn input_changes_reset_selection_and_preview() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("svc/orders.proxy").unwrap();
    session.set_preview_base("c2");

    session.set_branch("release");
    assert!(session.selection().is_empty());
    assert!(session.preview_base().is_none());
    assert!(!session.preview().is_loaded());
    assert!(session.entries().is_empty());
    assert_eq!(session.base_sha(), None);
    assert_eq!(session.head_sha(), None);
    assert_eq!(session.step(), BuildStep::Config);
    assert!(session.commits().is_empty());
}

#[tokio::test]
async fn fetch_failure_leaves_step_incomplete_and_retryable() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_branch("does-not-exist");
    let err = session.load_commits().await.unwrap_err();
    assert!(matches!(err, EngineError::Fetch(_)), "{err}");
    assert_eq!(session.step(), BuildStep::Config);

    // changing the input retries cleanly
    session.set_branch("main");
    session.load_commits().await.unwrap();
    assert_eq!(session.commits().len(), 3);
}

#[tokio::test]
async fn filter_projection_leaves_bulk_toggle_canonical() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.advance().unwrap();

    // filter down to one file, then bulk-toggle the folder
    session.set_filter(Some("orders"));
    let visible = shipwright_core::leaf_paths(session.visible_forest());
    assert_eq!(visible, vec!["svc/orders.proxy".to_string()]);

    session.toggle_folder("svc");
    // both svc leaves selected, not just the visible one
    assert!(session.selection().contains("svc/orders.proxy"));
    assert!(session.selection().contains("svc/invoices.pipeline"));

    session.set_filter(None);
    assert_eq!(shipwright_core::leaf_paths(session.visible_forest()).len(), 3);
}

#[tokio::test]
async fn file_replaced_by_directory_keeps_every_leaf_selectable() {
    let git = Arc::new(scripted_provider());
    // a diff where the path "a" is both a deleted file and the parent
    // directory of an added one
    git.set_diff(
        PROJECT,
        "c1",
        "c3",
        vec![
            ChangeEntry::new("a", ChangeStatus::Deleted),
            ChangeEntry::new("a/b.xml", ChangeStatus::Added),
        ],
    );
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter.clone());

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();

    let mut leaves = shipwright_core::leaf_paths(session.forest());
    leaves.sort();
    assert_eq!(leaves, vec!["a".to_string(), "a/b.xml".to_string()]);

    session.advance().unwrap();
    session.toggle_folder("a");
    assert!(session.selection().contains("a"));
    assert!(session.selection().contains("a/b.xml"));
    assert_eq!(session.folder_state("a"), FolderState::All);

    session.advance().unwrap();
    session.advance().unwrap();
    session.submit("job-d").await.unwrap();

    let request = &submitter.submitted()[0];
    let paths: Vec<&str> = request.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a", "a/b.xml"]);
    assert_eq!(request.files[0].status, ChangeStatus::Deleted);
    assert_eq!(request.files[1].status, ChangeStatus::Added);
}

#[tokio::test]
async fn retreat_walks_back_through_preview() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Full);
    session.load_commits().await.unwrap();
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("svc/orders.proxy").unwrap();
    session.advance().unwrap();
    session.advance().unwrap();
    assert_eq!(session.step(), BuildStep::Summary);

    assert_eq!(session.retreat().unwrap(), BuildStep::Preview);
    assert_eq!(session.retreat().unwrap(), BuildStep::Files);
    assert_eq!(session.retreat().unwrap(), BuildStep::Config);

    let err = session.retreat().unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }), "{err}");

    // walking back never touches the selection
    assert!(session.selection().contains("svc/orders.proxy"));
}

#[tokio::test]
async fn retreat_skips_preview_for_manual_and_stops_at_submitted() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Manual);
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("x.proxy").unwrap();
    session.advance().unwrap();
    assert_eq!(session.step(), BuildStep::Summary);

    // Summary -> Files directly; there is no Preview step for Manual
    assert_eq!(session.retreat().unwrap(), BuildStep::Files);

    session.advance().unwrap();
    session.submit("job-t").await.unwrap();
    let err = session.retreat().unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }), "{err}");
    assert_eq!(session.step(), BuildStep::Submitted);
}

#[tokio::test]
async fn overrides_are_surfaced_but_never_applied() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let overrides = Arc::new(MemoryOverrideProvider::new());
    overrides.set_overrides(
        "staging",
        vec![OverrideFile {
            file_path: "conf/endpoints.xml".to_string(),
            content: "<endpoint env=\"staging\"/>".to_string(),
        }],
    );

    let mut session = BuildSession::new(git, submitter.clone()).with_override_provider(overrides);
    session.set_project(PROJECT);
    session.set_branch("main");

    let files = session.list_overrides("staging").await.unwrap();
    assert_eq!(files.len(), 1);

    session.set_strategy(BuildStrategy::Manual);
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("x.proxy").unwrap();
    session.advance().unwrap();
    session.set_apply_overrides(true);
    session.submit("job-o").await.unwrap();

    // only the boolean travels with the manifest
    let request = &submitter.submitted()[0];
    assert!(request.apply_overrides);
    assert!(request.files.iter().all(|f| f.path != "conf/endpoints.xml"));
}

#[tokio::test]
async fn session_event_log_records_transitions() {
    let git = Arc::new(scripted_provider());
    let submitter = Arc::new(MemoryBuildSubmitter::new());
    let mut session = session_with(git, submitter);

    session.set_strategy(BuildStrategy::Manual);
    session.load_files().await.unwrap();
    session.advance().unwrap();
    session.toggle_file("x.proxy").unwrap();
    session.advance().unwrap();
    session.submit("job-e").await.unwrap();

    let steps: Vec<BuildStep> = session.events().iter().map(|e| e.step).collect();
    assert_eq!(
        steps,
        vec![
            BuildStep::Config,
            BuildStep::Files,
            BuildStep::Summary,
            BuildStep::Submitted
        ]
    );
    // timestamps are monotonic
    for pair in session.events().windows(2) {
        assert!(pair[0].at <= pair[1].at);
    }
}
