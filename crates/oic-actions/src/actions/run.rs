//! Run action
//!
//! Runs either an inline command, written to a temporary script in the
//! scratch area, or an existing script. Both run in the configured
//! working directory, or the manifest directory when none is set.

use crate::command;
use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;

/// Shell used when the entry does not name one
pub const DEFAULT_SHELL: &str = "bash";

/// Configuration of a `run` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSpec {
    /// Inline script text
    pub command: String,
    /// Script to execute, relative to the manifest directory
    pub script: String,
    pub shell: String,
    /// Relative to the workspace
    #[serde(rename = "working-directory")]
    pub working_directory: String,
}

impl ActionSpec for RunSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        let program = match (self.command.is_empty(), self.script.is_empty()) {
            (false, false) => {
                return Err(ActionError::InvalidProperty(format!(
                    "cannot specify both \"command\" and \"script\" properties for the \"{}\" action",
                    base.description()
                )));
            }
            (true, true) => {
                return Err(ActionError::InvalidProperty(format!(
                    "either \"command\" or \"script\" property is mandatory for the \"{}\" action",
                    base.description()
                )));
            }
            (false, true) => Program::Inline(self.command.clone()),
            (true, false) => {
                let script = ctx.manifest_path(&self.script);
                if !script.is_file() {
                    return Err(ActionError::InvalidProperty(format!(
                        "script {} does not exist",
                        script.display()
                    )));
                }
                Program::Script(script)
            }
        };

        let working_dir = if self.working_directory.is_empty() {
            ctx.manifest_dir().to_path_buf()
        } else {
            ctx.workspace_path(&self.working_directory)
        };

        let shell = if self.shell.is_empty() {
            DEFAULT_SHELL.to_string()
        } else {
            self.shell.clone()
        };

        Ok(Box::new(RunAction {
            description: base.description().to_string(),
            program,
            shell,
            working_dir,
        }))
    }
}

#[derive(Debug)]
enum Program {
    Inline(String),
    Script(PathBuf),
}

struct RunAction {
    description: String,
    program: Program,
    shell: String,
    working_dir: PathBuf,
}

#[async_trait]
impl Action for RunAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        match &self.program {
            Program::Inline(text) => {
                let mut script = tempfile::Builder::new()
                    .prefix("script-")
                    .tempfile_in(ctx.scratch_dir())?;
                if self.shell == DEFAULT_SHELL {
                    script.write_all(b"set -e\n")?;
                }
                script.write_all(text.as_bytes())?;
                script.flush()?;

                // The temporary file is removed when `script` drops
                let script_path = script.path().to_string_lossy().into_owned();
                command::run(
                    ctx,
                    &["/usr/bin/env", self.shell.as_str(), script_path.as_str()],
                    Some(&self.working_dir),
                )
                .await
            }
            Program::Script(path) => {
                let path = path.to_string_lossy();
                command::run(ctx, &[&*path], Some(&self.working_dir)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn inline(command: &str) -> RunSpec {
        RunSpec {
            command: command.to_string(),
            ..RunSpec::default()
        }
    }

    async fn context() -> (tempfile::TempDir, BuildContext) {
        let temp = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), temp.path().join("ws"));
        ctx.create_dirs().await.unwrap();
        (temp, ctx)
    }

    #[test]
    fn test_validate_exactly_one_program() {
        let ctx = BuildContext::new("/src", "/out", "/ws");
        let base = BaseAction::new("run");

        let both = RunSpec {
            command: "true".to_string(),
            script: "build.sh".to_string(),
            ..RunSpec::default()
        };
        let err = both.validate(&base, &ctx).err().unwrap();
        assert!(err.to_string().contains("cannot specify both"));

        let err = RunSpec::default().validate(&base, &ctx).err().unwrap();
        assert!(err.to_string().contains("is mandatory"));

        assert!(inline("true").validate(&base, &ctx).is_ok());
    }

    #[test]
    fn test_validate_script_must_exist() {
        let ctx = BuildContext::new("/nonexistent-manifest-dir", "/out", "/ws");
        let spec = RunSpec {
            script: "build.sh".to_string(),
            ..RunSpec::default()
        };
        assert!(spec.validate(&BaseAction::new("run"), &ctx).is_err());
    }

    #[tokio::test]
    async fn test_inline_command_in_working_directory() {
        let (_temp, ctx) = context().await;
        let workdir = ctx.workspace_dir().join("rootfs");
        std::fs::create_dir_all(&workdir).unwrap();

        let mut spec = inline("echo hello > out.txt");
        spec.working_directory = "rootfs".to_string();
        let action = spec.validate(&BaseAction::new("run"), &ctx).unwrap();
        action.run(&ctx).await.unwrap();

        assert_eq!(std::fs::read_to_string(workdir.join("out.txt")).unwrap(), "hello\n");
        // Temporary script is gone
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_default_shell_stops_on_error() {
        let (_temp, ctx) = context().await;

        let action = inline("false\ntouch reached")
            .validate(&BaseAction::new("run"), &ctx)
            .unwrap();
        assert!(action.run(&ctx).await.is_err());
        assert!(!ctx.manifest_dir().join("reached").exists());
    }

    #[tokio::test]
    async fn test_custom_shell_has_no_strict_prefix() {
        let (_temp, ctx) = context().await;

        let mut spec = inline("false\ntouch reached");
        spec.shell = "sh".to_string();
        let action = spec.validate(&BaseAction::new("run"), &ctx).unwrap();

        action.run(&ctx).await.unwrap();
        assert!(ctx.manifest_dir().join("reached").exists());
    }

    #[tokio::test]
    async fn test_script_mode() {
        let (temp, ctx) = context().await;
        let script = temp.path().join("build.sh");
        std::fs::write(&script, "#!/bin/sh\necho built > built.txt\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spec = RunSpec {
            script: "build.sh".to_string(),
            working_directory: ".".to_string(),
            ..RunSpec::default()
        };
        let action = spec.validate(&BaseAction::new("run"), &ctx).unwrap();
        action.run(&ctx).await.unwrap();

        assert!(ctx.workspace_dir().join("built.txt").exists());
    }
}
