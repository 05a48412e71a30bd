//! Revision store traits

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{PullFlags, PullOptions, RemoteOptions, RepoMode, TreeEntry};

/// Operations on an open repository
///
/// Implementations handle the backend-specific details. A handle is
/// released when dropped.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Location of the repository on disk
    fn path(&self) -> &Path;

    /// Resolve a branch (or partial checksum) to a commit checksum
    async fn resolve_rev(&self, branch: &str) -> Result<String>;

    /// Check out `subpath` of `commit` into `dest`
    ///
    /// A directory subtree populates `dest` itself; a file lands at
    /// `dest/<basename>`. Existing content in `dest` is merged.
    async fn checkout(&self, commit: &str, subpath: &str, dest: &Path) -> Result<()>;

    /// List every descendant of `root` in `commit`, parents before children
    ///
    /// `root` itself is not part of the result.
    async fn walk(&self, commit: &str, root: &str) -> Result<Vec<TreeEntry>>;

    /// Check whether a remote is configured
    async fn has_remote(&self, name: &str) -> Result<bool>;

    /// Register a remote
    async fn add_remote(&self, name: &str, url: &str, options: &RemoteOptions) -> Result<()>;

    /// Pull refs from a remote
    async fn pull(&self, remote: &str, refs: &[String], flags: PullFlags) -> Result<()>;

    /// Pull with an explicit option set
    async fn pull_with_options(&self, remote: &str, options: &PullOptions) -> Result<()>;
}

/// Opens or creates repositories
///
/// Actions go through a provider instead of naming a backend, so the
/// backend can be swapped (the build uses [`crate::OstreeCli`]).
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Open an existing repository
    async fn open(&self, path: &Path) -> Result<Box<dyn RevisionStore>>;

    /// Create a repository, initialising `path` if needed
    async fn create(&self, path: &Path, mode: RepoMode) -> Result<Box<dyn RevisionStore>>;

    /// Open the repository at `path`, creating it with `mode` if it does not exist yet
    async fn open_or_create(&self, path: &Path, mode: RepoMode) -> Result<Box<dyn RevisionStore>> {
        match self.open(path).await {
            Ok(repo) => Ok(repo),
            Err(crate::StoreError::NotARepository(_)) => self.create(path, mode).await,
            Err(e) => Err(e),
        }
    }
}
