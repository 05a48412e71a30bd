use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::{stderr, IsTerminal};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use cmd::build::BuildArgs;
use cmd::resolve::ResolveArgs;

#[derive(Parser, Debug)]
#[command(name = "oic", author, version, about = "OS image creator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an image as specified in the manifest file
    Build(BuildArgs),
    /// Parse the manifest file, expand all the expressions and print the text
    Resolve(ResolveArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Build(args) if args.verbose);
    let level = if verbose { "debug" } else { "info" };
    let default_directives = format!(
        "oic={level},oic_actions={level},oic_ostree={level},hyper=warn,reqwest=warn,rustls=warn",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(stderr().is_terminal())
                .with_target(false),
        )
        .init();

    let result = match cli.command {
        Commands::Build(args) => cmd::build::run_build(args).await,
        Commands::Resolve(args) => cmd::resolve::run_resolve(args),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
