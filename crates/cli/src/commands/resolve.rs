use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Result;
use keystone_bootstrap::config::EXTENSIONS_PREFIX;
use keystone_bootstrap::{ExtensionsConfig, JsonConfigurator, RuntimeProperties};
use keystone_engine::excluded_by;
use keystone_store::{ArtifactResolver, Coordinate, DiagnosticSink, RepositoryResolver};

pub fn handle_resolve(
    properties: Option<&Path>,
    coordinate: &str,
    local_repository: Option<PathBuf>,
    remotes: Vec<String>,
    verbose: bool,
) -> Result<()> {
    let properties = RuntimeProperties::load(properties)?;
    let mut config: ExtensionsConfig =
        JsonConfigurator::new(Arc::new(properties)).configurate(EXTENSIONS_PREFIX)?;
    if let Some(local_repository) = local_repository {
        config.local_repository = local_repository;
    }
    if !remotes.is_empty() {
        config.remote_repositories = remotes;
    }

    let sink = if verbose {
        DiagnosticSink::Tracing
    } else {
        DiagnosticSink::Discard
    };
    let resolver = RepositoryResolver::new(&config.local_repository, &config.remote_repositories, sink)?;
    let coordinate = Coordinate::parse(coordinate)?;
    let artifacts = resolver.resolve(&coordinate)?;

    println!("{} ({} artifacts)", artifacts.root(), artifacts.len());
    for artifact in &artifacts {
        match excluded_by(artifact.group()) {
            Some(prefix) => println!(
                "  - {} [excluded by {}] {}",
                artifact.coordinate(),
                prefix,
                artifact.file().display()
            ),
            None => println!("  - {} {}", artifact.coordinate(), artifact.file().display()),
        }
    }

    Ok(())
}
