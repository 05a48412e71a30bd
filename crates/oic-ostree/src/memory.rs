//! In-memory revision store
//!
//! Useful for tests and dry runs: commits are plain maps of paths to
//! entries, pulls are recorded rather than performed, and checkouts
//! write real files so callers can inspect the result.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, StoreError};
use crate::store::{RevisionStore, StoreProvider};
use crate::types::{EntryKind, PullFlags, PullOptions, RemoteOptions, RepoMode, TreeEntry};

/// Content of a committed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEntry {
    Directory,
    File(Vec<u8>),
    Symlink(String),
}

impl MemoryEntry {
    pub fn file(contents: impl AsRef<[u8]>) -> Self {
        MemoryEntry::File(contents.as_ref().to_vec())
    }

    fn kind(&self) -> EntryKind {
        match self {
            MemoryEntry::Directory => EntryKind::Directory,
            MemoryEntry::File(_) => EntryKind::File,
            MemoryEntry::Symlink(_) => EntryKind::Symlink,
        }
    }
}

/// A pull the store was asked to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRecord {
    pub remote: String,
    pub refs: Vec<String>,
    pub flags: PullFlags,
    pub override_remote_name: Option<String>,
}

#[derive(Debug, Default)]
struct RepoState {
    mode: RepoMode,
    branches: HashMap<String, String>,
    commits: HashMap<String, BTreeMap<String, MemoryEntry>>,
    remotes: BTreeMap<String, (String, RemoteOptions)>,
    pulls: Vec<PullRecord>,
}

/// Repository kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
    state: Arc<Mutex<RepoState>>,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>, mode: RepoMode) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(RepoState {
                mode,
                ..RepoState::default()
            })),
        }
    }

    /// Record a commit on `branch` and return its checksum
    ///
    /// Parent directories of every path are added implicitly.
    pub fn commit<'a>(
        &self,
        branch: &str,
        entries: impl IntoIterator<Item = (&'a str, MemoryEntry)>,
    ) -> String {
        let mut tree = BTreeMap::new();
        for (path, entry) in entries {
            let path = format!("/{}", path.trim_matches('/'));
            let mut parent = Path::new(&path).parent();
            while let Some(dir) = parent {
                let dir_str = dir.to_string_lossy().to_string();
                if dir_str != "/" {
                    tree.entry(dir_str).or_insert(MemoryEntry::Directory);
                }
                parent = dir.parent();
            }
            tree.insert(path, entry);
        }

        let mut state = self.lock();
        let checksum = format!("{:064x}", state.commits.len() + 1);
        state.commits.insert(checksum.clone(), tree);
        state.branches.insert(branch.to_string(), checksum.clone());
        checksum
    }

    pub fn mode(&self) -> RepoMode {
        self.lock().mode
    }

    /// Remotes configured so far, with their URL and options
    pub fn remotes(&self) -> Vec<(String, String, RemoteOptions)> {
        self.lock()
            .remotes
            .iter()
            .map(|(name, (url, options))| (name.clone(), url.clone(), options.clone()))
            .collect()
    }

    /// Pulls requested so far
    pub fn pulls(&self) -> Vec<PullRecord> {
        self.lock().pulls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RepoState> {
        // A poisoned lock only means a test panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tree(&self, commit: &str) -> Result<BTreeMap<String, MemoryEntry>> {
        self.lock()
            .commits
            .get(commit)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRevision(commit.to_string()))
    }
}

fn write_entry(dest: &Path, entry: &MemoryEntry) -> Result<()> {
    match entry {
        MemoryEntry::Directory => std::fs::create_dir_all(dest)?,
        MemoryEntry::File(data) => {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, data)?;
        }
        MemoryEntry::Symlink(target) => {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if dest.symlink_metadata().is_ok() {
                std::fs::remove_file(dest)?;
            }
            std::os::unix::fs::symlink(target, dest)?;
        }
    }
    Ok(())
}

#[async_trait]
impl RevisionStore for MemoryStore {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn resolve_rev(&self, branch: &str) -> Result<String> {
        let state = self.lock();
        if let Some(commit) = state.branches.get(branch) {
            return Ok(commit.clone());
        }
        if state.commits.contains_key(branch) {
            return Ok(branch.to_string());
        }
        Err(StoreError::UnknownRevision(branch.to_string()))
    }

    async fn checkout(&self, commit: &str, subpath: &str, dest: &Path) -> Result<()> {
        let tree = self.tree(commit)?;
        let subpath = format!("/{}", subpath.trim_matches('/'));

        match tree.get(&subpath) {
            Some(MemoryEntry::Directory) => {
                std::fs::create_dir_all(dest)?;
                let prefix = format!("{}/", subpath.trim_end_matches('/'));
                for (path, entry) in tree.iter().filter(|(p, _)| p.starts_with(&prefix)) {
                    write_entry(&dest.join(&path[prefix.len()..]), entry)?;
                }
                Ok(())
            }
            Some(entry) => {
                let name = subpath.rsplit('/').next().unwrap_or(&subpath);
                write_entry(&dest.join(name), entry)
            }
            None => Err(StoreError::Parse(format!("no such path '{}' in {}", subpath, commit))),
        }
    }

    async fn walk(&self, commit: &str, root: &str) -> Result<Vec<TreeEntry>> {
        let tree = self.tree(commit)?;
        let root = format!("/{}", root.trim_matches('/'));
        let prefix = if root == "/" {
            root.clone()
        } else {
            format!("{}/", root)
        };

        Ok(tree
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix) && **path != root)
            .map(|(path, entry)| TreeEntry {
                path: path.clone(),
                kind: entry.kind(),
            })
            .collect())
    }

    async fn has_remote(&self, name: &str) -> Result<bool> {
        Ok(self.lock().remotes.contains_key(name))
    }

    async fn add_remote(&self, name: &str, url: &str, options: &RemoteOptions) -> Result<()> {
        let mut state = self.lock();
        if state.remotes.contains_key(name) {
            return Err(StoreError::CommandFailed {
                command: format!("remote add {}", name),
                status: "exit status: 1".to_string(),
                stderr: format!("Remote {} already exists", name),
            });
        }
        state
            .remotes
            .insert(name.to_string(), (url.to_string(), options.clone()));
        Ok(())
    }

    async fn pull(&self, remote: &str, refs: &[String], flags: PullFlags) -> Result<()> {
        let mut state = self.lock();
        if !state.remotes.contains_key(remote) {
            return Err(StoreError::CommandFailed {
                command: format!("pull {}", remote),
                status: "exit status: 1".to_string(),
                stderr: format!("Remote \"{}\" not found", remote),
            });
        }
        state.pulls.push(PullRecord {
            remote: remote.to_string(),
            refs: refs.to_vec(),
            flags,
            override_remote_name: None,
        });
        Ok(())
    }

    async fn pull_with_options(&self, remote: &str, options: &PullOptions) -> Result<()> {
        self.pull(remote, &options.refs, PullFlags::default()).await?;
        if let Some(last) = self.lock().pulls.last_mut() {
            last.override_remote_name = options.override_remote_name.clone();
        }
        Ok(())
    }
}

/// Provider serving [`MemoryStore`] repositories keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    repos: Arc<Mutex<HashMap<PathBuf, MemoryStore>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `store` available at its own path
    pub fn insert(&self, store: MemoryStore) {
        self.lock().insert(store.path.clone(), store);
    }

    /// Fetch the repository at `path`, if one was inserted or created
    pub fn get(&self, path: &Path) -> Option<MemoryStore> {
        self.lock().get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, MemoryStore>> {
        self.repos.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn open(&self, path: &Path) -> Result<Box<dyn RevisionStore>> {
        self.get(path)
            .map(|store| Box::new(store) as Box<dyn RevisionStore>)
            .ok_or_else(|| StoreError::NotARepository(path.to_path_buf()))
    }

    async fn create(&self, path: &Path, mode: RepoMode) -> Result<Box<dyn RevisionStore>> {
        let store = MemoryStore::new(path, mode);
        self.insert(store.clone());
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_store() -> (MemoryStore, String) {
        let store = MemoryStore::new("/repo", RepoMode::Archive);
        let commit = store.commit(
            "os/x86_64/desktop",
            [
                ("usr/lib/ostree-boot/vmlinuz", MemoryEntry::file("kernel")),
                ("usr/lib/ostree-boot/efi/EFI/BOOT/BOOTX64.EFI", MemoryEntry::file("efi")),
                ("usr/lib/ostree-boot/current", MemoryEntry::Symlink("vmlinuz".into())),
            ],
        );
        (store, commit)
    }

    #[tokio::test]
    async fn test_resolve_branch_and_checksum() {
        let (store, commit) = boot_store();
        assert_eq!(store.resolve_rev("os/x86_64/desktop").await.unwrap(), commit);
        assert_eq!(store.resolve_rev(&commit).await.unwrap(), commit);
        assert!(store.resolve_rev("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_walk_is_preorder_without_root() {
        let (store, commit) = boot_store();
        let entries = store.walk(&commit, "/usr/lib/ostree-boot").await.unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();

        assert!(!paths.contains(&"/usr/lib/ostree-boot"));
        let efi = paths.iter().position(|p| *p == "/usr/lib/ostree-boot/efi").unwrap();
        let boot = paths
            .iter()
            .position(|p| *p == "/usr/lib/ostree-boot/efi/EFI/BOOT")
            .unwrap();
        assert!(efi < boot);
        assert_eq!(entries.len(), 6);
    }

    #[tokio::test]
    async fn test_checkout_directory_and_file() {
        let (store, commit) = boot_store();
        let temp = tempfile::tempdir().unwrap();

        store
            .checkout(&commit, "/usr/lib/ostree-boot/efi/EFI", temp.path())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(temp.path().join("BOOT/BOOTX64.EFI")).unwrap(),
            b"efi"
        );

        let files = temp.path().join("files");
        store
            .checkout(&commit, "/usr/lib/ostree-boot/vmlinuz", &files)
            .await
            .unwrap();
        assert_eq!(std::fs::read(files.join("vmlinuz")).unwrap(), b"kernel");
    }

    #[tokio::test]
    async fn test_remotes_and_pulls() {
        let provider = MemoryProvider::new();
        let repo = provider
            .open_or_create(Path::new("/mirror"), RepoMode::Archive)
            .await
            .unwrap();

        assert!(!repo.has_remote("lirios").await.unwrap());
        repo.add_remote("lirios", "https://example.org/repo", &RemoteOptions::default())
            .await
            .unwrap();
        assert!(repo.has_remote("lirios").await.unwrap());

        let refs = vec!["a".to_string(), "b".to_string()];
        repo.pull("lirios", &refs, PullFlags::mirror()).await.unwrap();

        let pulls = provider.get(Path::new("/mirror")).unwrap().pulls();
        assert_eq!(pulls.len(), 1);
        assert!(pulls[0].flags.mirror);
        assert_eq!(pulls[0].refs, refs);
    }

    #[tokio::test]
    async fn test_pull_unknown_remote_fails() {
        let store = MemoryStore::new("/repo", RepoMode::Bare);
        assert!(store.pull("nowhere", &[], PullFlags::default()).await.is_err());
    }
}
