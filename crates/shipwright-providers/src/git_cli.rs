//! `GitDataProvider` implementation over the `git` binary.
//!
//! Shells out to git for every query. Returns an error if git is not
//! available or the project directory is not a repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::traits::GitDataProvider;
use crate::types::{ChangeEntry, ChangeStatus, CommitRef};

/// Field separator used in `git log` format strings.
const LOG_FIELD_SEP: char = '\u{1f}';

/// Git provider that runs the `git` CLI against local repositories.
#[derive(Debug, Clone)]
pub struct CliGitProvider {
    root: PathBuf,
    /// When set, every project id resolves to `root` itself instead of a
    /// subdirectory. Used by the CLI, which operates on one repository.
    single_repo: bool,
}

impl CliGitProvider {
    /// Provider over a directory of repositories; each project id names a
    /// subdirectory of `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            single_repo: false,
        }
    }

    /// Provider pinned to a single repository. Project ids are labels
    /// only and do not affect path resolution.
    pub fn for_repo(repo: impl Into<PathBuf>) -> Self {
        Self {
            root: repo.into(),
            single_repo: true,
        }
    }

    fn repo_dir(&self, project_id: &str) -> PathBuf {
        if self.single_repo {
            self.root.clone()
        } else {
            self.root.join(project_id)
        }
    }

    async fn run_git(&self, repo_dir: &Path, args: &[&str]) -> DataResult<String> {
        debug!(?repo_dir, ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DataError::Unavailable(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DataError::CommandFailed(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Map a `git diff --name-status` letter to a change status.
///
/// Renames and copies are surfaced as `Added` at the destination path;
/// type changes count as modifications.
fn status_from_letter(letter: &str) -> ChangeStatus {
    match letter.chars().next() {
        Some('A') => ChangeStatus::Added,
        Some('D') => ChangeStatus::Deleted,
        Some('R') | Some('C') => ChangeStatus::Added,
        _ => ChangeStatus::Modified,
    }
}

/// Parse `--name-status` output into (status, path) pairs.
///
/// Rename/copy lines carry two paths; the destination is kept.
fn parse_name_status(output: &str) -> Vec<(ChangeStatus, String)> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let letter = fields.next()?;
            let path = fields.last()?;
            Some((status_from_letter(letter), path.to_string()))
        })
        .collect()
}

/// Split full `git diff` output into per-file patch texts keyed by the
/// head-side path.
///
/// File boundaries are `diff --git` headers; the path is taken from the
/// `+++ b/` line when present, falling back to `--- a/` for deletions.
fn split_patches(output: &str) -> Vec<(String, String)> {
    let mut patches = Vec::new();
    let mut current: Option<(Option<String>, Vec<&str>)> = None;

    for line in output.lines() {
        if line.starts_with("diff --git ") {
            if let Some((Some(path), body)) = current.take() {
                patches.push((path, body.join("\n")));
            }
            current = Some((None, vec![line]));
            continue;
        }
        if let Some((path, body)) = current.as_mut() {
            if path.is_none() {
                if let Some(p) = line.strip_prefix("+++ b/") {
                    *path = Some(p.to_string());
                } else if line == "+++ /dev/null" {
                    // Deleted file; path comes from the preceding --- line.
                    *path = body
                        .iter()
                        .find_map(|l| l.strip_prefix("--- a/"))
                        .map(|p| p.to_string());
                }
            }
            body.push(line);
        }
    }
    if let Some((Some(path), body)) = current {
        patches.push((path, body.join("\n")));
    }

    patches
}

impl CliGitProvider {
    async fn diff_inner(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> DataResult<Vec<ChangeEntry>> {
        let repo = self.repo_dir(project_id);

        let mut status_args = vec!["diff", "--name-status", base, head];
        let mut patch_args = vec!["diff", base, head];
        if !paths.is_empty() {
            status_args.push("--");
            patch_args.push("--");
            for p in paths {
                status_args.push(p.as_str());
                patch_args.push(p.as_str());
            }
        }

        let statuses = self
            .run_git(&repo, &status_args)
            .await
            .map_err(|e| remap_unknown_revision(e, base, head))?;
        let patches = self.run_git(&repo, &patch_args).await?;

        let mut patch_map: std::collections::HashMap<String, String> =
            split_patches(&patches).into_iter().collect();

        Ok(parse_name_status(&statuses)
            .into_iter()
            .map(|(status, path)| {
                let patch = patch_map.remove(&path);
                ChangeEntry {
                    path,
                    status,
                    patch,
                }
            })
            .collect())
    }
}

fn remap_unknown_revision(err: DataError, base: &str, head: &str) -> DataError {
    if let DataError::CommandFailed(msg) = &err {
        if msg.contains("unknown revision") || msg.contains("bad revision") {
            return DataError::CommitNotFound(format!("{base}..{head}"));
        }
    }
    err
}

#[async_trait]
impl GitDataProvider for CliGitProvider {
    async fn list_branches(&self, project_id: &str) -> DataResult<Vec<String>> {
        let repo = self.repo_dir(project_id);
        let out = self
            .run_git(
                &repo,
                &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
            )
            .await?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn list_commits(&self, project_id: &str, branch: &str) -> DataResult<Vec<CommitRef>> {
        let repo = self.repo_dir(project_id);
        let format = format!("--format=%H{LOG_FIELD_SEP}%s");
        let out = self
            .run_git(&repo, &["log", &format, branch, "--"])
            .await
            .map_err(|e| {
                if let DataError::CommandFailed(msg) = &e {
                    if msg.contains("unknown revision") || msg.contains("bad revision") {
                        return DataError::BranchNotFound(branch.to_string());
                    }
                }
                e
            })?;

        out.lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let (sha, message) = line
                    .split_once(LOG_FIELD_SEP)
                    .ok_or_else(|| DataError::Parse(format!("malformed log line: {line}")))?;
                Ok(CommitRef::new(sha, message))
            })
            .collect()
    }

    async fn list_tree(&self, project_id: &str, branch: &str) -> DataResult<Vec<String>> {
        let repo = self.repo_dir(project_id);
        let out = self
            .run_git(&repo, &["ls-tree", "-r", "--name-only", branch])
            .await?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn diff(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
    ) -> DataResult<Vec<ChangeEntry>> {
        self.diff_inner(project_id, base, head, &[]).await
    }

    async fn diff_scoped(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> DataResult<Vec<ChangeEntry>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.diff_inner(project_id, base, head, paths).await
    }
}
