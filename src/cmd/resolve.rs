//! `oic resolve`: print the expanded manifest

use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use oic_actions::Manifest;
use std::path::PathBuf;

use super::{host_architecture, template_vars};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Architecture
    #[arg(short, long, default_value_t = host_architecture().to_string())]
    pub arch: String,
}

pub fn run_resolve(args: ResolveArgs) -> Result<()> {
    let vars = template_vars(&args.arch);

    let manifest = Manifest::load(&args.manifest, &vars)
        .wrap_err_with(|| format!("Failed to open manifest \"{}\"", args.manifest.display()))?;

    print!("{}", manifest);
    Ok(())
}
