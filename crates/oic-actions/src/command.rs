//! External command execution
//!
//! Commands inherit the build's stdout and stderr so tool output shows up
//! as it is produced. Every invocation is reported at debug level as
//! `+ argv...` before it starts.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Run `argv` in `dir` (or the current directory), streaming its output
pub async fn run<S: AsRef<str>>(ctx: &BuildContext, argv: &[S], dir: Option<&Path>) -> Result<()> {
    let mut cmd = prepare(ctx, argv, dir)?;
    cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    wait(cmd, argv).await
}

/// Run `argv` with its stdout written to the file at `output`
///
/// The file is created or truncated. Stderr still streams to the build's
/// stderr.
pub async fn run_with_output<S: AsRef<str>>(
    ctx: &BuildContext,
    argv: &[S],
    dir: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let file = std::fs::File::create(output).map_err(|e| {
        ActionError::ExecutionFailed(format!("cannot create {}: {}", output.display(), e))
    })?;

    let mut cmd = prepare(ctx, argv, dir)?;
    cmd.stdout(Stdio::from(file)).stderr(Stdio::inherit());
    wait(cmd, argv).await
}

fn prepare<S: AsRef<str>>(ctx: &BuildContext, argv: &[S], dir: Option<&Path>) -> Result<Command> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ActionError::ExecutionFailed("empty command line".to_string()))?;

    ctx.reporter()
        .report(Event::debug(format!("+ {}", command_line(argv))));

    let program: &str = program.as_ref();
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|arg| arg.as_ref())).stdin(Stdio::null());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

async fn wait<S: AsRef<str>>(mut cmd: Command, argv: &[S]) -> Result<()> {
    let program: &str = argv.first().map(|p| p.as_ref()).unwrap_or_default();
    let status = cmd.status().await.map_err(|e| {
        ActionError::ExecutionFailed(format!("failed to run {}: {}", program, e))
    })?;

    if !status.success() {
        return Err(ActionError::CommandFailed {
            command: program.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn command_line<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| arg.as_ref())
        .collect::<Vec<&str>>()
        .join(" ")
}
