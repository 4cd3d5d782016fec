//! Caching / request-coalescing wrapper for `GitDataProvider`.
//!
//! Queries are keyed by their full input tuple. Identical concurrent
//! requests coalesce onto a single underlying fetch via per-key
//! `tokio::sync::OnceCell` entries. Successful results are cached for the
//! lifetime of the wrapper; failures leave the cell empty so the next
//! request retries.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::DataResult;
use crate::traits::GitDataProvider;
use crate::types::{ChangeEntry, CommitRef};

type CellMap<K, V> = Mutex<HashMap<K, Arc<OnceCell<V>>>>;

/// Fetch-once cache over any `GitDataProvider`.
pub struct CachedGitProvider<P> {
    inner: P,
    branches: CellMap<String, Vec<String>>,
    commits: CellMap<(String, String), Vec<CommitRef>>,
    trees: CellMap<(String, String), Vec<String>>,
    diffs: CellMap<(String, String, String), Vec<ChangeEntry>>,
    scoped_diffs: CellMap<(String, String, String, Vec<String>), Vec<ChangeEntry>>,
}

impl<P> CachedGitProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            branches: Mutex::new(HashMap::new()),
            commits: Mutex::new(HashMap::new()),
            trees: Mutex::new(HashMap::new()),
            diffs: Mutex::new(HashMap::new()),
            scoped_diffs: Mutex::new(HashMap::new()),
        }
    }

    /// Drop all cached results. Subsequent queries hit the inner provider.
    pub fn clear(&self) {
        self.branches.lock().unwrap().clear();
        self.commits.lock().unwrap().clear();
        self.trees.lock().unwrap().clear();
        self.diffs.lock().unwrap().clear();
        self.scoped_diffs.lock().unwrap().clear();
    }
}

/// Resolve `key` through the map's once-cell, running `fetch` only when no
/// cached value exists. Concurrent callers for the same key share one fetch.
async fn get_or_fetch<K, V, F, Fut>(map: &CellMap<K, V>, key: K, fetch: F) -> DataResult<V>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DataResult<V>>,
{
    let cell = {
        let mut map = map.lock().unwrap();
        map.entry(key).or_default().clone()
    };
    let value = cell.get_or_try_init(fetch).await?;
    Ok(value.clone())
}

#[async_trait]
impl<P: GitDataProvider> GitDataProvider for CachedGitProvider<P> {
    async fn list_branches(&self, project_id: &str) -> DataResult<Vec<String>> {
        get_or_fetch(&self.branches, project_id.to_string(), || {
            self.inner.list_branches(project_id)
        })
        .await
    }

    async fn list_commits(&self, project_id: &str, branch: &str) -> DataResult<Vec<CommitRef>> {
        let key = (project_id.to_string(), branch.to_string());
        get_or_fetch(&self.commits, key, || {
            self.inner.list_commits(project_id, branch)
        })
        .await
    }

    async fn list_tree(&self, project_id: &str, branch: &str) -> DataResult<Vec<String>> {
        let key = (project_id.to_string(), branch.to_string());
        get_or_fetch(&self.trees, key, || self.inner.list_tree(project_id, branch)).await
    }

    async fn diff(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
    ) -> DataResult<Vec<ChangeEntry>> {
        let key = (project_id.to_string(), base.to_string(), head.to_string());
        get_or_fetch(&self.diffs, key, || self.inner.diff(project_id, base, head)).await
    }

    async fn diff_scoped(
        &self,
        project_id: &str,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> DataResult<Vec<ChangeEntry>> {
        let key = (
            project_id.to_string(),
            base.to_string(),
            head.to_string(),
            paths.to_vec(),
        );
        get_or_fetch(&self.scoped_diffs, key, || {
            self.inner.diff_scoped(project_id, base, head, paths)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryGitProvider;
    use crate::types::ChangeStatus;
    use std::sync::Arc as StdArc;

    fn scripted() -> MemoryGitProvider {
        let provider = MemoryGitProvider::new();
        provider.add_branch("proj", "main");
        provider.add_commit("proj", "main", "c2", "second");
        provider.add_commit("proj", "main", "c1", "first");
        provider.set_diff(
            "proj",
            "c1",
            "c2",
            vec![crate::types::ChangeEntry::new(
                "a/b.xml",
                ChangeStatus::Modified,
            )],
        );
        provider
    }

    #[tokio::test]
    async fn repeated_diff_hits_inner_once() {
        let cached = CachedGitProvider::new(scripted());

        let first = cached.diff("proj", "c1", "c2").await.unwrap();
        let second = cached.diff("proj", "c1", "c2").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.diff_fetches(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_diffs_coalesce() {
        let cached = StdArc::new(CachedGitProvider::new(scripted()));

        let a = cached.clone();
        let b = cached.clone();
        let (ra, rb) = tokio::join!(
            async move { a.diff("proj", "c1", "c2").await },
            async move { b.diff("proj", "c1", "c2").await },
        );
        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(cached.inner.diff_fetches(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_separately() {
        let provider = scripted();
        provider.set_diff("proj", "c0", "c2", vec![]);
        let cached = CachedGitProvider::new(provider);

        cached.diff("proj", "c1", "c2").await.unwrap();
        cached.diff("proj", "c0", "c2").await.unwrap();
        assert_eq!(cached.inner.diff_fetches(), 2);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cached = CachedGitProvider::new(scripted());

        // No scripted diff for this range: first call fails.
        assert!(cached.diff("proj", "c9", "c2").await.is_err());
        assert_eq!(cached.inner.diff_fetches(), 1);

        // A retry reaches the inner provider again.
        assert!(cached.diff("proj", "c9", "c2").await.is_err());
        assert_eq!(cached.inner.diff_fetches(), 2);
    }

    #[tokio::test]
    async fn clear_drops_cached_results() {
        let cached = CachedGitProvider::new(scripted());

        cached.list_commits("proj", "main").await.unwrap();
        cached.clear();
        cached.list_commits("proj", "main").await.unwrap();
        assert_eq!(cached.inner.commit_fetches(), 2);
    }
}
