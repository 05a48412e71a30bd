//! Pull action
//!
//! Pulls branches of an OS from a remote into a repository, registering
//! the remote on first use.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use oic_ostree::{PullOptions, RemoteOptions, RepoMode, RevisionStore};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration of an `ostree-pull` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OstreePullSpec {
    pub repository: String,
    pub url: String,
    /// Remote name
    pub osname: String,
    pub branches: Vec<String>,
    #[serde(rename = "no-gpg-verify")]
    pub no_gpg_verify: bool,
}

/// Fields shared by the pull and mirror actions, checked and resolved
#[derive(Debug, Clone)]
pub(super) struct RemoteSource {
    pub repository: PathBuf,
    pub url: String,
    pub osname: String,
    pub branches: Vec<String>,
}

impl RemoteSource {
    pub fn validate(
        base: &BaseAction,
        ctx: &BuildContext,
        repository: &str,
        url: &str,
        osname: &str,
        branches: &[String],
    ) -> Result<Self> {
        if repository.is_empty() {
            return Err(ActionError::missing("repository", &base.action));
        }
        if url.is_empty() {
            return Err(ActionError::missing("url", &base.action));
        }
        if osname.is_empty() {
            return Err(ActionError::missing("osname", &base.action));
        }
        if branches.is_empty() {
            return Err(ActionError::missing("branches", &base.action));
        }

        Ok(Self {
            repository: ctx.workspace_path(repository),
            url: url.to_string(),
            osname: osname.to_string(),
            branches: branches.to_vec(),
        })
    }

    /// Open the repository, creating it in archive mode when missing
    pub async fn open(&self, ctx: &BuildContext) -> Result<Box<dyn RevisionStore>> {
        tokio::fs::create_dir_all(&self.repository).await?;
        Ok(ctx
            .store_provider()
            .open_or_create(&self.repository, RepoMode::Archive)
            .await?)
    }

    /// Register the remote unless the repository already knows it
    pub async fn ensure_remote(
        &self,
        ctx: &BuildContext,
        repo: &dyn RevisionStore,
        options: &RemoteOptions,
    ) -> Result<()> {
        if repo.has_remote(&self.osname).await? {
            return Ok(());
        }
        ctx.reporter().report(Event::debug(format!(
            "Adding remote {} ({}) to {}",
            self.osname,
            self.url,
            repo.path().display()
        )));
        repo.add_remote(&self.osname, &self.url, options).await?;
        Ok(())
    }
}

impl ActionSpec for OstreePullSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        let source = RemoteSource::validate(
            base,
            ctx,
            &self.repository,
            &self.url,
            &self.osname,
            &self.branches,
        )?;

        Ok(Box::new(OstreePullAction {
            description: base.description().to_string(),
            source,
            gpg_verify: !self.no_gpg_verify,
        }))
    }
}

struct OstreePullAction {
    description: String,
    source: RemoteSource,
    gpg_verify: bool,
}

#[async_trait]
impl Action for OstreePullAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let repo = self.source.open(ctx).await?;

        let options = RemoteOptions::default().with_gpg_verify(self.gpg_verify);
        self.source.ensure_remote(ctx, &*repo, &options).await?;

        ctx.reporter().report(Event::info(format!(
            "Pulling {} from {}",
            self.source.branches.join(", "),
            self.source.osname
        )));
        let pull = PullOptions {
            override_remote_name: Some(self.source.osname.clone()),
            refs: self.source.branches.clone(),
        };
        repo.pull_with_options(&self.source.osname, &pull).await?;
        Ok(())
    }
}
