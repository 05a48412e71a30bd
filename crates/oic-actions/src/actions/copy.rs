//! Copy action
//!
//! Copies a tree from the manifest directory into the workspace.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::fsutil;
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration of a `copy` entry
///
/// - `from` (required): source, relative to the manifest directory
/// - `to` (required): destination directory, relative to the workspace
/// - `exclude`: paths relative to `from` that are not copied
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopySpec {
    pub from: String,
    pub to: String,
    pub exclude: Vec<String>,
}

impl ActionSpec for CopySpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        if self.from.is_empty() {
            return Err(ActionError::missing("from", &base.action));
        }
        if self.to.is_empty() {
            return Err(ActionError::missing("to", &base.action));
        }

        Ok(Box::new(CopyAction {
            description: base.description().to_string(),
            source: ctx.manifest_path(&self.from),
            dest: ctx.workspace_path(&self.to),
            exclude: self.exclude.clone(),
        }))
    }
}

struct CopyAction {
    description: String,
    source: PathBuf,
    dest: PathBuf,
    exclude: Vec<String>,
}

#[async_trait]
impl Action for CopyAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        ctx.reporter().report(Event::info(format!(
            "Copying {} to {}",
            self.source.display(),
            self.dest.display()
        )));

        let source = self.source.clone();
        let dest = self.dest.clone();
        let exclude = self.exclude.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dest)?;

            // A single file lands inside the destination directory
            if source.is_file() {
                let name = source.file_name().ok_or_else(|| {
                    ActionError::InvalidProperty(format!("{} has no file name", source.display()))
                })?;
                return fsutil::copy_file(&source, &dest.join(name));
            }
            fsutil::copy_tree(&source, &dest, &exclude)
        })
        .await
        .map_err(|e| ActionError::ExecutionFailed(format!("copy task failed: {}", e)))?
    }
}
