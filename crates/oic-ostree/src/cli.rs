//! Revision store backed by the `ostree` command-line tool
//!
//! Every operation shells out to `ostree --repo=<path> ...` and captures
//! its output. Commands are logged at debug level before they run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{RevisionStore, StoreProvider};
use crate::types::{EntryKind, PullFlags, PullOptions, RemoteOptions, RepoMode, TreeEntry};

/// Name of the binary driven by this backend
const OSTREE: &str = "ostree";

/// Repository handle using the external `ostree` binary
#[derive(Debug, Clone)]
pub struct OstreeRepo {
    path: PathBuf,
    mode: RepoMode,
}

impl OstreeRepo {
    /// Open an existing repository
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo_arg = repo_arg(&path);
        let mode = match run_ostree(&[repo_arg.as_str(), "config", "get", "core.mode"]).await {
            Ok(out) => out.parse()?,
            Err(StoreError::CommandFailed { .. }) => return Err(StoreError::NotARepository(path)),
            Err(e) => return Err(e),
        };
        Ok(Self { path, mode })
    }

    /// Initialise a repository at `path`
    pub async fn create(path: impl AsRef<Path>, mode: RepoMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&path).await?;

        let repo_arg = repo_arg(&path);
        let mode_arg = format!("--mode={}", mode);
        run_ostree(&[repo_arg.as_str(), "init", mode_arg.as_str()]).await?;
        Ok(Self { path, mode })
    }

    /// Storage mode reported by the repository
    pub fn mode(&self) -> RepoMode {
        self.mode
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let repo_arg = repo_arg(&self.path);
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(repo_arg.as_str());
        full.extend_from_slice(args);
        run_ostree(&full).await
    }
}

#[async_trait]
impl RevisionStore for OstreeRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn resolve_rev(&self, branch: &str) -> Result<String> {
        let out = self.run(&["rev-parse", branch]).await.map_err(|e| match e {
            StoreError::CommandFailed { .. } => StoreError::UnknownRevision(branch.to_string()),
            other => other,
        })?;

        let commit = out.trim();
        if commit.is_empty() {
            return Err(StoreError::UnknownRevision(branch.to_string()));
        }
        Ok(commit.to_string())
    }

    async fn checkout(&self, commit: &str, subpath: &str, dest: &Path) -> Result<()> {
        let subpath_arg = format!("--subpath={}", subpath);
        let dest_str = dest.to_string_lossy();

        // ostree places a file subpath at dest/<basename>; directories fill dest
        self.run(&[
            "checkout",
            "--user-mode",
            "--union",
            subpath_arg.as_str(),
            commit,
            &*dest_str,
        ])
        .await?;
        Ok(())
    }

    async fn walk(&self, commit: &str, root: &str) -> Result<Vec<TreeEntry>> {
        let out = self.run(&["ls", "-R", commit, root]).await?;
        parse_ls(&out, root)
    }

    async fn has_remote(&self, name: &str) -> Result<bool> {
        let out = self.run(&["remote", "list"]).await?;
        Ok(out.lines().any(|line| line.trim() == name))
    }

    async fn add_remote(&self, name: &str, url: &str, options: &RemoteOptions) -> Result<()> {
        let option_args = options.to_args();
        let mut args = vec!["remote", "add"];
        args.extend(option_args.iter().map(String::as_str));
        args.push(name);
        args.push(url);
        self.run(&args).await?;
        Ok(())
    }

    async fn pull(&self, remote: &str, refs: &[String], flags: PullFlags) -> Result<()> {
        let mut args = vec!["pull"];
        args.extend(flags.to_args());
        args.push(remote);
        args.extend(refs.iter().map(String::as_str));
        self.run(&args).await?;
        Ok(())
    }

    async fn pull_with_options(&self, remote: &str, options: &PullOptions) -> Result<()> {
        self.pull(remote, &options.refs, PullFlags::default()).await?;

        // Re-point the refs under the requested remote name
        if let Some(alias) = options
            .override_remote_name
            .as_deref()
            .filter(|alias| *alias != remote)
        {
            for r in &options.refs {
                let commit = self.resolve_rev(&format!("{}:{}", remote, r)).await?;
                let create = format!("--create={}:{}", alias, r);
                self.run(&["refs", create.as_str(), commit.as_str()]).await?;
            }
        }
        Ok(())
    }
}

/// Provider handing out [`OstreeRepo`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct OstreeCli;

#[async_trait]
impl StoreProvider for OstreeCli {
    async fn open(&self, path: &Path) -> Result<Box<dyn RevisionStore>> {
        Ok(Box::new(OstreeRepo::open(path).await?))
    }

    async fn create(&self, path: &Path, mode: RepoMode) -> Result<Box<dyn RevisionStore>> {
        Ok(Box::new(OstreeRepo::create(path, mode).await?))
    }
}

fn repo_arg(path: &Path) -> String {
    format!("--repo={}", path.display())
}

/// Run `ostree` with `args` and return its stdout
async fn run_ostree(args: &[&str]) -> Result<String> {
    debug!("+ {} {}", OSTREE, args.join(" "));

    let output = Command::new(OSTREE)
        .args(args)
        .output()
        .await
        .map_err(StoreError::Spawn)?;

    if !output.status.success() {
        return Err(StoreError::CommandFailed {
            command: format!("{} {}", OSTREE, args.join(" ")),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `ostree ls -R` output into tree entries, dropping `root` itself
///
/// Lines look like `d00755 0 0      0 /usr/lib` or
/// `l00777 0 0      0 /usr/lib/link -> target`.
fn parse_ls(output: &str, root: &str) -> Result<Vec<TreeEntry>> {
    let root = normalize(root);
    let mut entries = Vec::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let mut rest = line.trim_start();
        let mut fields = Vec::with_capacity(4);
        for _ in 0..4 {
            let end = rest
                .find(char::is_whitespace)
                .ok_or_else(|| StoreError::Parse(line.to_string()))?;
            fields.push(&rest[..end]);
            rest = rest[end..].trim_start();
        }

        let kind = match fields[0].chars().next() {
            Some('d') => EntryKind::Directory,
            Some('-') => EntryKind::File,
            Some('l') => EntryKind::Symlink,
            _ => return Err(StoreError::Parse(line.to_string())),
        };

        let path = match kind {
            EntryKind::Symlink => rest.split(" -> ").next().unwrap_or(rest),
            _ => rest,
        };
        if path.is_empty() {
            return Err(StoreError::Parse(line.to_string()));
        }

        let path = normalize(path);
        if path == root {
            continue;
        }
        entries.push(TreeEntry { path, kind });
    }

    Ok(entries)
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
