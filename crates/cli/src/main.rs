mod cli;
mod commands;

use clap::Parser;

use crate::cli::Commands;
use crate::commands::{handle_compose, handle_inspect, handle_resolve};

fn main() -> eyre::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let properties = cli.properties.as_deref();
    match cli.command {
        Commands::Resolve {
            coordinate,
            local_repository,
            remotes,
            verbose,
        } => handle_resolve(properties, &coordinate, local_repository, remotes, verbose)?,
        Commands::Inspect => handle_inspect(properties)?,
        Commands::Compose => handle_compose(properties)?,
    }

    Ok(())
}
