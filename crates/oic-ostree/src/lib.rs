//! OSTree repository access
//!
//! This crate provides the revision store used by the image creator's
//! `ostree-*` and `efiboot` actions. Repositories are content-addressed,
//! branch/commit based filesystem stores.
//!
//! # Backends
//!
//! - **OstreeRepo**: drives the `ostree` command-line tool
//! - **MemoryStore**: keeps commits in memory (tests, dry runs)
//!
//! # Example
//!
//! ```no_run
//! use oic_ostree::{OstreeRepo, RemoteOptions, PullFlags, RevisionStore};
//!
//! # async fn example() -> oic_ostree::Result<()> {
//! let repo = OstreeRepo::open("/var/tmp/repo").await?;
//!
//! if !repo.has_remote("lirios").await? {
//!     let options = RemoteOptions::default().without_gpg_verify();
//!     repo.add_remote("lirios", "https://repo.example.org/ostree", &options).await?;
//! }
//!
//! let refs = vec!["lirios/unstable/x86_64/desktop".to_string()];
//! repo.pull("lirios", &refs, PullFlags::mirror()).await?;
//!
//! let commit = repo.resolve_rev("lirios/unstable/x86_64/desktop").await?;
//! repo.checkout(&commit, "/usr/lib/ostree-boot", "/tmp/boot".as_ref()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use cli::{OstreeCli, OstreeRepo};
pub use error::{Result, StoreError};
pub use memory::{MemoryEntry, MemoryProvider, MemoryStore, PullRecord};
pub use store::{RevisionStore, StoreProvider};
pub use types::{EntryKind, PullFlags, PullOptions, RemoteOptions, RepoMode, TreeEntry};
