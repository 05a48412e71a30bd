//! ISO mastering action

use crate::command;
use crate::context::{join_clean, BuildContext};
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Longest volume label ISO9660 allows
pub const MAX_LABEL_LEN: usize = 32;

/// Artifact file names, relative to the tree being mastered
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Artifacts {
    pub iso: String,
    pub checksum: String,
}

/// Configuration of a `mkiso` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MkIsoSpec {
    pub label: String,
    /// Volume set name, defaults to the label
    pub volume: String,
    /// Tree to master, relative to the workspace
    pub path: String,
    /// Add an isolinux boot catalog for legacy BIOS boot
    pub isolinux: bool,
    /// Add `images/efiboot.img` as EFI boot image
    pub efiboot: bool,
    pub implantisomd5: bool,
    pub artifacts: Artifacts,
}

impl ActionSpec for MkIsoSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        if self.label.is_empty() {
            return Err(ActionError::missing("label", &base.action));
        }
        let label: String = self.label.chars().take(MAX_LABEL_LEN).collect();
        if label.len() < self.label.len() {
            ctx.reporter().report(Event::warn(format!(
                "Label \"{}\" is longer than {} characters, using \"{}\"",
                self.label, MAX_LABEL_LEN, label
            )));
        }
        let volume = if self.volume.is_empty() {
            label.clone()
        } else {
            self.volume.clone()
        };

        if self.path.is_empty() {
            return Err(ActionError::missing("path", &base.action));
        }
        let tree = ctx.workspace_path(&self.path);

        if self.artifacts.iso.is_empty() {
            return Err(ActionError::missing("artifacts.iso", &base.action));
        }
        let iso = join_clean(&tree, Path::new(&self.artifacts.iso));
        let checksum = (!self.artifacts.checksum.is_empty())
            .then(|| join_clean(&tree, Path::new(&self.artifacts.checksum)));

        Ok(Box::new(MkIsoAction {
            description: base.description().to_string(),
            label,
            volume,
            tree,
            isolinux: self.isolinux,
            efiboot: self.efiboot,
            implantisomd5: self.implantisomd5,
            iso,
            checksum,
        }))
    }
}

struct MkIsoAction {
    description: String,
    label: String,
    volume: String,
    tree: PathBuf,
    isolinux: bool,
    efiboot: bool,
    implantisomd5: bool,
    iso: PathBuf,
    checksum: Option<PathBuf>,
}

impl MkIsoAction {
    fn genisoimage_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "genisoimage",
            "-verbose",
            "-V",
            self.label.as_str(),
            "-volset",
            self.volume.as_str(),
            "-rational-rock",
            "-J",
            "-joliet-long",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.isolinux {
            args.extend(
                [
                    "-eltorito-boot",
                    "isolinux/isolinux.bin",
                    "-eltorito-catalog",
                    "isolinux/boot.cat",
                    "-no-emul-boot",
                    "-boot-load-size",
                    "4",
                    "-boot-info-table",
                ]
                .map(String::from),
            );
        }

        if self.efiboot {
            args.extend(
                ["-eltorito-alt-boot", "-efi-boot", "images/efiboot.img", "-no-emul-boot"]
                    .map(String::from),
            );
        }

        args.push("-o".to_string());
        args.push(self.iso.to_string_lossy().into_owned());
        args.push(".".to_string());
        args
    }

    /// Where each artifact ends up in the output directory
    fn outputs(&self, ctx: &BuildContext) -> Vec<(PathBuf, PathBuf)> {
        [Some(&self.iso), self.checksum.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|artifact| {
                let name = artifact.file_name()?;
                Some((artifact.clone(), ctx.output_dir().join(name)))
            })
            .collect()
    }

    async fn write_checksum(&self, ctx: &BuildContext, checksum: &Path) -> Result<()> {
        let iso_name = self
            .iso
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = checksum.parent().unwrap_or(&self.tree);

        command::run_with_output(
            ctx,
            &["sha256sum", "-b", "--tag", iso_name.as_str()],
            Some(dir),
            checksum,
        )
        .await
    }
}

#[async_trait]
impl Action for MkIsoAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let outputs = self.outputs(ctx);
        if !ctx.force() {
            if let Some((_, existing)) = outputs.iter().find(|(_, dest)| dest.exists()) {
                return Err(ActionError::ExecutionFailed(format!(
                    "{} already exists, use --force to overwrite it",
                    existing.display()
                )));
            }
        }

        command::run(ctx, &self.genisoimage_args(), Some(&self.tree)).await?;

        let iso = self.iso.to_string_lossy();
        if ctx.architecture() == "x86_64" {
            command::run(ctx, &["isohybrid", &*iso], Some(&self.tree)).await?;
        }

        if self.implantisomd5 {
            command::run(ctx, &["implantisomd5", &*iso], Some(&self.tree)).await?;
        }

        if let Some(checksum) = &self.checksum {
            self.write_checksum(ctx, checksum).await?;
        }

        tokio::fs::create_dir_all(ctx.output_dir()).await?;
        for (artifact, dest) in outputs {
            ctx.reporter().report(Event::info(format!(
                "Moving {} to the output directory...",
                artifact.display()
            )));
            let from = artifact.to_string_lossy();
            let to = dest.to_string_lossy();
            command::run(ctx, &["mv", "-f", &*from, &*to], None).await?;
        }
        Ok(())
    }
}
