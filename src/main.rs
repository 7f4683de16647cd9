mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_migrator=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    match &cli.command {
        Commands::Plan { path, format } => {
            cli::plan(path, overrides, format)?;
        }
        Commands::Apply { path } => {
            cli::apply(path, overrides)?;
        }
    }

    Ok(())
}
