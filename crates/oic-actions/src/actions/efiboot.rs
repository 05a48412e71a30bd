//! EFI boot image action
//!
//! Extracts the EFI boot loader tree from a commit and packs it into a
//! FAT image suitable as an El Torito EFI boot image.

use crate::command;
use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::fsutil;
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use oic_ostree::RevisionStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location of the EFI tree inside an OS commit
pub const EFI_SUBTREE: &str = "/usr/lib/ostree-boot/efi/EFI";

/// Extra room given to the FAT image on top of the tree size
const SIZE_MARGIN_PERCENT: u64 = 25;

/// Configuration of an `efiboot` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EfiBootSpec {
    pub repository: String,
    pub branch: String,
    /// Image file to create
    pub path: String,
}

impl ActionSpec for EfiBootSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        if self.repository.is_empty() {
            return Err(ActionError::missing("repository", &base.action));
        }
        if self.branch.is_empty() {
            return Err(ActionError::missing("branch", &base.action));
        }
        if self.path.is_empty() {
            return Err(ActionError::missing("path", &base.action));
        }

        Ok(Box::new(EfiBootAction {
            description: base.description().to_string(),
            repository: ctx.workspace_path(&self.repository),
            branch: self.branch.clone(),
            image: ctx.workspace_path(&self.path),
        }))
    }
}

struct EfiBootAction {
    description: String,
    repository: PathBuf,
    branch: String,
    image: PathBuf,
}

impl EfiBootAction {
    async fn build_image(
        &self,
        ctx: &BuildContext,
        repo: &dyn RevisionStore,
        commit: &str,
        tree: &Path,
    ) -> Result<()> {
        repo.checkout(commit, EFI_SUBTREE, tree).await?;

        let walk_root = tree.to_path_buf();
        let size = tokio::task::spawn_blocking(move || {
            fsutil::estimate_directory_size(&walk_root, SIZE_MARGIN_PERCENT)
        })
        .await
        .map_err(|e| ActionError::ExecutionFailed(format!("size estimation failed: {}", e)))??;

        ctx.reporter().report(Event::debug(format!(
            "Creating {} bytes EFI image {}",
            size,
            self.image.display()
        )));
        let file = tokio::fs::File::create(&self.image).await?;
        file.set_len(size).await?;
        drop(file);

        let filled = self.fill_image(ctx, tree).await;
        if filled.is_err() {
            let _ = tokio::fs::remove_file(&self.image).await;
        }
        filled
    }

    /// Format the image and copy `tree` into it
    async fn fill_image(&self, ctx: &BuildContext, tree: &Path) -> Result<()> {
        let image = self.image.to_string_lossy();
        command::run(ctx, &["mkfs.msdos", &*image], None).await?;

        let mount_point = tempfile::Builder::new()
            .prefix("mountpoint-")
            .tempdir_in(ctx.scratch_dir())?;
        let mount_str = mount_point.path().to_string_lossy().into_owned();

        command::run(ctx, &["mount", "-n", &*image, mount_str.as_str(), "-oloop"], None).await?;

        let copied = self.copy_into(ctx, tree, mount_point.path()).await;

        // Always unmount, even when the copy failed
        let unmounted = command::run(ctx, &["umount", mount_str.as_str()], None).await;
        copied?;
        unmounted
    }

    async fn copy_into(&self, ctx: &BuildContext, tree: &Path, mount_point: &Path) -> Result<()> {
        let efi_dir = mount_point.join("EFI");
        tokio::fs::create_dir_all(&efi_dir).await?;

        let efi_str = efi_dir.to_string_lossy();
        command::run(
            ctx,
            &["cp", "-R", "-L", "--preserve=timestamps", ".", &*efi_str],
            Some(tree),
        )
        .await
    }
}

#[async_trait]
impl Action for EfiBootAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        if let Some(parent) = self.image.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let repo = ctx.store_provider().open(&self.repository).await?;
        let commit = repo.resolve_rev(&self.branch).await?;

        let tree = ctx.scratch_dir().join("efiboot");
        let result = self.build_image(ctx, &*repo, &commit, &tree).await;

        // The extracted tree is only needed while the image is built
        if let Err(e) = tokio::fs::remove_dir_all(&tree).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                ctx.reporter().report(Event::warn(format!(
                    "Failed to remove {}: {}",
                    tree.display(),
                    e
                )));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oic_ostree::{MemoryEntry, MemoryProvider, MemoryStore, RepoMode};
    use std::sync::Arc;

    fn spec() -> EfiBootSpec {
        EfiBootSpec {
            repository: "repo".to_string(),
            branch: "os/x86_64/live".to_string(),
            path: "iso/images/efiboot.img".to_string(),
        }
    }

    #[test]
    fn test_validate_requires_all_properties() {
        let ctx = BuildContext::new("/src", "/out", "/ws");
        let base = BaseAction::new("efiboot");

        for missing in ["repository", "branch", "path"] {
            let mut s = spec();
            match missing {
                "repository" => s.repository.clear(),
                "branch" => s.branch.clear(),
                _ => s.path.clear(),
            }
            let err = s.validate(&base, &ctx).err().unwrap();
            assert!(
                matches!(err, ActionError::MissingProperty { ref property, .. } if property == missing)
            );
        }
        assert!(spec().validate(&base, &ctx).is_ok());
    }

    #[tokio::test]
    async fn test_run_unknown_branch() {
        let temp = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();
        let ws = temp.path().join("ws");
        provider.insert(MemoryStore::new(ws.join("repo"), RepoMode::Archive));

        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), &ws)
            .with_store_provider(Arc::new(provider));
        ctx.create_dirs().await.unwrap();

        let action = spec().validate(&BaseAction::new("efiboot"), &ctx).unwrap();
        let err = action.run(&ctx).await.unwrap_err();
        assert!(matches!(err, ActionError::Store(_)));
    }

    #[tokio::test]
    async fn test_run_leaves_no_scratch_tree() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        let store = MemoryStore::new(ws.join("repo"), RepoMode::Archive);
        store.commit(
            "os/x86_64/live",
            [(
                "usr/lib/ostree-boot/efi/EFI/BOOT/BOOTX64.EFI",
                MemoryEntry::file(vec![0u8; 4096]),
            )],
        );
        let provider = MemoryProvider::new();
        provider.insert(store);

        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), &ws)
            .with_store_provider(Arc::new(provider));
        ctx.create_dirs().await.unwrap();

        let action = spec().validate(&BaseAction::new("efiboot"), &ctx).unwrap();
        let image = ws.join("iso/images/efiboot.img");

        // Formatting and mounting need tools and privileges the test
        // host may lack; either way the outcome must be consistent
        match action.run(&ctx).await {
            Ok(()) => assert!(image.is_file()),
            Err(_) => assert!(!image.exists()),
        }
        assert!(!ctx.scratch_dir().join("efiboot").exists());
    }
}
