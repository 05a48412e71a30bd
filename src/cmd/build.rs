//! `oic build`: run a manifest

use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use oic_actions::{BuildContext, Manifest, Pipeline, TracingReporter};
use serde_json::Value;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use super::{host_architecture, template_vars};

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Architecture
    #[arg(short, long, default_value_t = host_architecture().to_string())]
    pub arch: String,

    /// Path where all the artifacts go
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Path where all the build files go
    #[arg(short, long, default_value = "/var/tmp")]
    pub workspace: PathBuf,

    /// Keep all the files produced during the build
    #[arg(short, long)]
    pub keep: bool,

    /// Overwrite previously generated files
    #[arg(short, long)]
    pub force: bool,

    /// More messages during the build
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run_build(args: BuildArgs) -> Result<()> {
    let manifest_path = std::path::absolute(&args.manifest)
        .wrap_err("Failed to get absolute representation of manifest path")?;
    let output_dir = std::path::absolute(&args.output)
        .wrap_err("Failed to get absolute representation of the output directory")?;
    let workspace = std::path::absolute(&args.workspace)
        .wrap_err("Failed to get absolute representation of the workspace")?;

    tokio::fs::create_dir_all(&workspace)
        .await
        .wrap_err_with(|| format!("Failed to create workspace directory {}", workspace.display()))?;

    let mut vars = template_vars(&args.arch);

    info!("Reading manifest file \"{}\"...", manifest_path.display());
    let manifest = Manifest::load(&manifest_path, &vars)
        .wrap_err_with(|| format!("Failed to open manifest \"{}\"", manifest_path.display()))?;

    // Exposed to templates rendered by the actions
    vars.insert(
        "kernelArguments".to_string(),
        Value::from(manifest.variables().kernel_arguments.clone()),
    );

    let manifest_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    // Removed by hand below, so that an interrupt can remove it too
    let build_dir = tempfile::Builder::new()
        .prefix("oic-")
        .keep(true)
        .tempdir_in(&workspace)
        .wrap_err("Failed to create temporary directory")?
        .path()
        .to_path_buf();
    if args.keep {
        info!("Workspace directory: {}", build_dir.display());
    }

    let reporter = Arc::new(TracingReporter::new(std::io::stderr().is_terminal()));
    let ctx = BuildContext::new(manifest_dir, output_dir, &build_dir)
        .with_architecture(args.arch)
        .with_keep(args.keep)
        .with_force(args.force)
        .with_verbose(args.verbose)
        .with_template_vars(vars)
        .with_reporter(reporter);

    if let Err(e) = ctx.create_dirs().await {
        remove_build_dir(&build_dir, args.keep);
        return Err(e).wrap_err("Failed to create build directories");
    }

    let mut terminate =
        signal(SignalKind::terminate()).wrap_err("Failed to install SIGTERM handler")?;
    let mut pipeline = Pipeline::new();

    let outcome = tokio::select! {
        result = pipeline.build(&manifest, &ctx) => result,
        Ok(()) = tokio::signal::ctrl_c() => interrupted("SIGINT", &build_dir, args.keep),
        Some(()) = terminate.recv() => interrupted("SIGTERM", &build_dir, args.keep),
    };

    remove_build_dir(&build_dir, args.keep);

    outcome?;
    info!("Build finished");
    Ok(())
}

/// Abandon the build after a signal; actions in flight get no cleanup
fn interrupted(signal: &str, build_dir: &Path, keep: bool) -> ! {
    warn!("{} received, aborting build", signal);
    remove_build_dir(build_dir, keep);
    std::process::exit(1);
}

fn remove_build_dir(build_dir: &Path, keep: bool) {
    if keep {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(build_dir) {
        error!(
            "Failed to delete temporary directory \"{}\": {}",
            build_dir.display(),
            e
        );
    }
}
