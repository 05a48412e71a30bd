//! OS deployment action
//!
//! Creates a sysroot under `path`, pulls the OS branch into its bare
//! repository and deploys it. Driven through the `ostree` tool because
//! pulling into a bare repository needs the privileged code paths of the
//! binary.

use crate::command;
use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration of an `ostree-deploy` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OstreeDeploySpec {
    /// Sysroot, relative to the workspace
    pub path: String,
    pub url: String,
    pub osname: String,
    pub branch: String,
    #[serde(rename = "no-gpg-verify")]
    pub no_gpg_verify: bool,
}

impl ActionSpec for OstreeDeploySpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        for (property, value) in [
            ("path", &self.path),
            ("url", &self.url),
            ("osname", &self.osname),
            ("branch", &self.branch),
        ] {
            if value.is_empty() {
                return Err(ActionError::missing(property, &base.action));
            }
        }

        Ok(Box::new(OstreeDeployAction {
            description: base.description().to_string(),
            sysroot: ctx.workspace_path(&self.path),
            url: self.url.clone(),
            osname: self.osname.clone(),
            branch: self.branch.clone(),
            no_gpg_verify: self.no_gpg_verify,
        }))
    }
}

struct OstreeDeployAction {
    description: String,
    sysroot: PathBuf,
    url: String,
    osname: String,
    branch: String,
    no_gpg_verify: bool,
}

impl OstreeDeployAction {
    fn repo_dir(&self) -> PathBuf {
        self.sysroot.join("ostree/repo")
    }

    /// Directory holding the deployments of this OS
    fn deployments_dir(&self) -> PathBuf {
        self.sysroot.join("ostree/deploy").join(&self.osname).join("deploy")
    }

    /// Commands run in order to deploy the OS
    fn commands(&self) -> Vec<Vec<String>> {
        let repo = format!("--repo={}", self.repo_dir().display());
        let sysroot = format!("--sysroot={}", self.sysroot.display());

        let mut remote_add = vec![
            "ostree".to_string(),
            repo.clone(),
            "remote".to_string(),
            "add".to_string(),
            "--if-not-exists".to_string(),
        ];
        if self.no_gpg_verify {
            remote_add.push("--no-gpg-verify".to_string());
        }
        remote_add.extend([self.osname.clone(), self.url.clone()]);

        vec![
            vec!["ostree".into(), repo.clone(), "init".into(), "--mode=bare".into()],
            remote_add,
            vec!["ostree".into(), repo, "pull".into(), self.osname.clone(), self.branch.clone()],
            vec![
                "ostree".into(),
                "admin".into(),
                "os-init".into(),
                self.osname.clone(),
                sysroot.clone(),
            ],
            vec![
                "ostree".into(),
                "admin".into(),
                "deploy".into(),
                self.branch.clone(),
                sysroot,
                format!("--os={}", self.osname),
            ],
        ]
    }
}

#[async_trait]
impl Action for OstreeDeployAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        tokio::fs::create_dir_all(self.sysroot.join("ostree/deploy")).await?;
        tokio::fs::create_dir_all(self.repo_dir()).await?;

        for argv in self.commands() {
            command::run(ctx, &argv, None).await?;
        }

        ctx.reporter()
            .report(Event::info("Removing immutable attribute from deployment..."));
        clear_immutable(ctx, &self.deployments_dir()).await
    }
}

/// Run `chattr -i` on every directory below `root`
///
/// Failures are only logged: not every filesystem supports the attribute.
async fn clear_immutable(ctx: &BuildContext, root: &Path) -> Result<()> {
    let walk_root = root.to_path_buf();
    let dirs = tokio::task::spawn_blocking(move || {
        WalkDir::new(walk_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| ActionError::ExecutionFailed(format!("directory walk failed: {}", e)))?;

    for dir in dirs {
        let dir_str = dir.to_string_lossy();
        if let Err(e) = command::run(ctx, &["chattr", "-i", &*dir_str], None).await {
            ctx.reporter().report(Event::debug(format!(
                "Ignoring chattr failure on {}: {}",
                dir.display(),
                e
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{CollectingReporter, Level};
    use std::sync::Arc;

    fn spec() -> OstreeDeploySpec {
        OstreeDeploySpec {
            path: "sysroot".to_string(),
            url: "https://repo.example.com/ostree".to_string(),
            osname: "lirios".to_string(),
            branch: "lirios/unstable/x86_64/desktop".to_string(),
            no_gpg_verify: false,
        }
    }

    fn prepared(spec: &OstreeDeploySpec) -> OstreeDeployAction {
        OstreeDeployAction {
            description: "deploy".to_string(),
            sysroot: PathBuf::from("/ws/sysroot"),
            url: spec.url.clone(),
            osname: spec.osname.clone(),
            branch: spec.branch.clone(),
            no_gpg_verify: spec.no_gpg_verify,
        }
    }

    #[test]
    fn test_validate_mandatory_properties() {
        let ctx = BuildContext::new("/src", "/out", "/ws");
        let base = BaseAction::new("ostree-deploy");

        assert!(spec().validate(&base, &ctx).is_ok());

        let mut s = spec();
        s.osname.clear();
        let err = s.validate(&base, &ctx).err().unwrap();
        assert!(matches!(err, ActionError::MissingProperty { ref property, .. } if property == "osname"));
    }

    #[test]
    fn test_command_sequence() {
        let commands = prepared(&spec()).commands();

        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], vec!["ostree", "--repo=/ws/sysroot/ostree/repo", "init", "--mode=bare"]);
        assert_eq!(
            commands[1],
            vec![
                "ostree", "--repo=/ws/sysroot/ostree/repo", "remote", "add", "--if-not-exists",
                "lirios", "https://repo.example.com/ostree",
            ]
        );
        assert_eq!(commands[3], vec!["ostree", "admin", "os-init", "lirios", "--sysroot=/ws/sysroot"]);
        assert_eq!(commands[4].last().map(String::as_str), Some("--os=lirios"));
    }

    #[test]
    fn test_gpg_verification_switch() {
        let mut s = spec();
        s.no_gpg_verify = true;
        let commands = prepared(&s).commands();
        assert!(commands[1].contains(&"--no-gpg-verify".to_string()));
    }

    #[test]
    fn test_deployments_dir() {
        assert_eq!(
            prepared(&spec()).deployments_dir(),
            PathBuf::from("/ws/sysroot/ostree/deploy/lirios/deploy")
        );
    }

    #[tokio::test]
    async fn test_clear_immutable_ignores_failures() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("a/b")).unwrap();

        let reporter = Arc::new(CollectingReporter::new());
        let ctx = BuildContext::new("/src", "/out", "/ws").with_reporter(reporter.clone());

        // chattr may be missing or unsupported here; either way this succeeds
        clear_immutable(&ctx, temp.path()).await.unwrap();

        let commands: Vec<_> = reporter
            .messages(Level::Debug)
            .into_iter()
            .filter(|m| m.starts_with("+ chattr -i"))
            .collect();
        assert_eq!(commands.len(), 3);
    }
}
