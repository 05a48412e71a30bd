//! Mirror action
//!
//! Like `ostree-pull`, but refs are mirrored under their own names and
//! signatures are never checked.

use super::ostree_pull::RemoteSource;
use crate::context::BuildContext;
use crate::error::Result;
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use oic_ostree::{PullFlags, RemoteOptions};
use serde::Deserialize;

/// Configuration of an `ostree-mirror` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OstreeMirrorSpec {
    pub repository: String,
    pub url: String,
    pub osname: String,
    pub branches: Vec<String>,
}

impl ActionSpec for OstreeMirrorSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        let source = RemoteSource::validate(
            base,
            ctx,
            &self.repository,
            &self.url,
            &self.osname,
            &self.branches,
        )?;

        Ok(Box::new(OstreeMirrorAction {
            description: base.description().to_string(),
            source,
        }))
    }
}

struct OstreeMirrorAction {
    description: String,
    source: RemoteSource,
}

#[async_trait]
impl Action for OstreeMirrorAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let repo = self.source.open(ctx).await?;

        let options = RemoteOptions::default().without_gpg_verify();
        self.source.ensure_remote(ctx, &*repo, &options).await?;

        ctx.reporter().report(Event::info(format!(
            "Mirroring {} from {}",
            self.source.branches.join(", "),
            self.source.url
        )));
        repo.pull(&self.source.osname, &self.source.branches, PullFlags::mirror())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use oic_ostree::{MemoryProvider, RepoMode};
    use std::sync::Arc;

    fn spec() -> OstreeMirrorSpec {
        OstreeMirrorSpec {
            repository: "mirror".to_string(),
            url: "https://repo.example.com/ostree".to_string(),
            osname: "lirios".to_string(),
            branches: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn test_validate_mandatory_properties() {
        let ctx = BuildContext::new("/src", "/out", "/ws");
        let base = BaseAction::new("ostree-mirror");

        let mut s = spec();
        s.url.clear();
        let err = s.validate(&base, &ctx).err().unwrap();
        assert!(matches!(err, ActionError::MissingProperty { ref property, .. } if property == "url"));

        assert!(spec().validate(&base, &ctx).is_ok());
    }

    #[tokio::test]
    async fn test_mirror_creates_repository_and_pulls() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        let provider = MemoryProvider::new();

        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), &ws)
            .with_store_provider(Arc::new(provider.clone()));
        let action = spec().validate(&BaseAction::new("ostree-mirror"), &ctx).unwrap();
        action.run(&ctx).await.unwrap();

        assert!(ws.join("mirror").is_dir());
        let store = provider.get(&ws.join("mirror")).unwrap();
        assert_eq!(store.mode(), RepoMode::Archive);

        let remotes = store.remotes();
        assert!(remotes[0].2.no_gpg_verify);
        assert!(remotes[0].2.no_gpg_verify_summary);

        let pulls = store.pulls();
        assert_eq!(pulls.len(), 1);
        assert!(pulls[0].flags.mirror);
        assert_eq!(pulls[0].refs, vec!["a", "b"]);
    }
}
