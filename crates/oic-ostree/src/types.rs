//! Common types for revision store operations

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Storage mode of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoMode {
    /// Files stored as-is, owned by the real uid/gid (requires root)
    Bare,
    /// Files stored as-is, ownership kept in extended attributes
    BareUser,
    /// Like `BareUser` without extended attribute metadata
    BareUserOnly,
    /// Compressed objects, suitable for serving over HTTP
    #[default]
    Archive,
}

impl RepoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoMode::Bare => "bare",
            RepoMode::BareUser => "bare-user",
            RepoMode::BareUserOnly => "bare-user-only",
            RepoMode::Archive => "archive",
        }
    }
}

impl fmt::Display for RepoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bare" => Ok(RepoMode::Bare),
            "bare-user" => Ok(RepoMode::BareUser),
            "bare-user-only" => Ok(RepoMode::BareUserOnly),
            // Older repositories report archive mode under its legacy name
            "archive" | "archive-z2" => Ok(RepoMode::Archive),
            other => Err(StoreError::Parse(format!("unknown repository mode '{}'", other))),
        }
    }
}

/// Options used when registering a remote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOptions {
    /// Alternative URL for content (objects) as opposed to metadata
    pub content_url: Option<String>,
    /// HTTP proxy used to reach the remote
    pub proxy: Option<String>,
    /// Do not verify commit signatures
    pub no_gpg_verify: bool,
    /// Do not verify summary signatures
    pub no_gpg_verify_summary: bool,
    /// Accept invalid TLS certificates
    pub tls_permissive: bool,
    /// Collection ID advertised by the remote
    pub collection_id: Option<String>,
}

impl RemoteOptions {
    /// Disable both commit and summary signature verification
    pub fn without_gpg_verify(mut self) -> Self {
        self.no_gpg_verify = true;
        self.no_gpg_verify_summary = true;
        self
    }

    /// Set both verification switches from a single flag
    pub fn with_gpg_verify(mut self, verify: bool) -> Self {
        self.no_gpg_verify = !verify;
        self.no_gpg_verify_summary = !verify;
        self
    }

    /// Command line arguments for `ostree remote add`, excluding name and URL
    pub(crate) fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.no_gpg_verify {
            args.push("--no-gpg-verify".to_string());
        }
        if self.no_gpg_verify_summary {
            args.push("--set=gpg-verify-summary=false".to_string());
        }
        if let Some(url) = &self.content_url {
            args.push(format!("--set=contenturl={}", url));
        }
        if let Some(proxy) = &self.proxy {
            args.push(format!("--set=proxy={}", proxy));
        }
        if self.tls_permissive {
            args.push("--set=tls-permissive=true".to_string());
        }
        if let Some(id) = &self.collection_id {
            args.push(format!("--collection-id={}", id));
        }
        args
    }
}

/// Flags controlling a pull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullFlags {
    /// Write refs under their original names instead of `remote:ref`
    pub mirror: bool,
    /// Fetch only commit metadata
    pub commit_only: bool,
    /// Verify object checksums as they arrive
    pub untrusted: bool,
    /// Reject objects a bare-user-only repository could not hold
    pub bare_user_only_files: bool,
}

impl PullFlags {
    pub fn mirror() -> Self {
        Self {
            mirror: true,
            ..Self::default()
        }
    }

    pub(crate) fn to_args(self) -> Vec<&'static str> {
        let mut args = Vec::new();
        if self.mirror {
            args.push("--mirror");
        }
        if self.commit_only {
            args.push("--commit-metadata-only");
        }
        if self.untrusted {
            args.push("--untrusted");
        }
        if self.bare_user_only_files {
            args.push("--bareuseronly-files");
        }
        args
    }
}

/// Options for a pull with an explicit ref list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Record pulled refs under this remote name
    pub override_remote_name: Option<String>,
    /// Refs to fetch
    pub refs: Vec<String>,
}

/// Type of an entry inside a committed tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

/// An entry found while walking a committed tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path inside the commit
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Final path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_mode_parse() {
        assert_eq!("bare".parse::<RepoMode>().unwrap(), RepoMode::Bare);
        assert_eq!("bare-user\n".parse::<RepoMode>().unwrap(), RepoMode::BareUser);
        assert_eq!("archive-z2".parse::<RepoMode>().unwrap(), RepoMode::Archive);
        assert!("zip".parse::<RepoMode>().is_err());
    }

    #[test]
    fn test_repo_mode_display() {
        assert_eq!(RepoMode::BareUserOnly.to_string(), "bare-user-only");
        assert_eq!(RepoMode::default(), RepoMode::Archive);
    }

    #[test]
    fn test_remote_options_args() {
        assert!(RemoteOptions::default().to_args().is_empty());

        let args = RemoteOptions::default().without_gpg_verify().to_args();
        assert_eq!(args, vec!["--no-gpg-verify", "--set=gpg-verify-summary=false"]);

        let args = RemoteOptions {
            proxy: Some("http://proxy:3128".to_string()),
            ..RemoteOptions::default()
        }
        .with_gpg_verify(true)
        .to_args();
        assert_eq!(args, vec!["--set=proxy=http://proxy:3128"]);
    }

    #[test]
    fn test_pull_flags_args() {
        assert!(PullFlags::default().to_args().is_empty());
        assert_eq!(PullFlags::mirror().to_args(), vec!["--mirror"]);

        let flags = PullFlags {
            commit_only: true,
            untrusted: true,
            ..PullFlags::default()
        };
        assert_eq!(flags.to_args(), vec!["--commit-metadata-only", "--untrusted"]);
    }

    #[test]
    fn test_tree_entry_file_name() {
        let entry = TreeEntry {
            path: "/usr/lib/ostree-boot/vmlinuz".to_string(),
            kind: EntryKind::File,
        };
        assert_eq!(entry.file_name(), "vmlinuz");
        assert!(!entry.is_dir());
    }
}
