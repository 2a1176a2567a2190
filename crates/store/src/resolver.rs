use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::artifact::{Artifact, ArtifactSet};
use crate::coordinate::Coordinate;
use crate::descriptor::{ArtifactDescriptor, verify_sha256};
use crate::error::{RemoteError, ResolutionError, Result};
use crate::local::LocalRepository;
use crate::remote::{RemoteRepository, open_remote};

const DIAGNOSTICS_TARGET: &str = "keystone_store::diagnostics";

/// Resolves a coordinate into the artifact set of its dependency closure.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, coordinate: &Coordinate) -> Result<ArtifactSet>;
}

/// Where the resolver's own diagnostic chatter goes.
///
/// The resolver never writes to stdout or stderr directly; its progress messages are
/// either forwarded to `tracing` or dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiagnosticSink {
    #[default]
    Tracing,
    Discard,
}

impl DiagnosticSink {
    fn emit(self, repository: &str, message: &str) {
        if self == DiagnosticSink::Tracing {
            debug!(target: DIAGNOSTICS_TARGET, repository, "{}", message);
        }
    }
}

/// Resolver backed by a local cache and an ordered list of remote repositories.
pub struct RepositoryResolver {
    local: LocalRepository,
    remotes: Vec<Box<dyn RemoteRepository>>,
    sink: DiagnosticSink,
}

impl RepositoryResolver {
    /// Opens every remote location and prepares the local cache.
    pub fn new(local_root: impl Into<PathBuf>, remotes: &[String], sink: DiagnosticSink) -> Result<Self> {
        let remotes = remotes
            .iter()
            .map(|location| open_remote(location))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_repositories(LocalRepository::new(local_root), remotes, sink))
    }

    pub fn with_repositories(
        local: LocalRepository,
        remotes: Vec<Box<dyn RemoteRepository>>,
        sink: DiagnosticSink,
    ) -> Self {
        sink.emit(
            &local.root().display().to_string(),
            "Using local repository",
        );
        for remote in &remotes {
            sink.emit(remote.id(), "Using remote repository");
        }
        Self { local, remotes, sink }
    }

    pub fn local(&self) -> &LocalRepository {
        &self.local
    }

    /// Finds the descriptor for `coordinate`, fetching it into the cache when needed.
    fn locate(&self, coordinate: &Coordinate) -> Result<(PathBuf, ArtifactDescriptor)> {
        if let Some(found) = self.local.find(coordinate)? {
            return Ok(found);
        }

        let relative = coordinate.relative_path();
        let mut unreachable = Vec::new();

        for remote in &self.remotes {
            let bytes = match remote.fetch(&relative) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(RemoteError::Unreachable { repository, reason }) => {
                    self.sink.emit(&repository, &reason);
                    unreachable.push(repository);
                    continue;
                }
            };

            match remote.fetch(&format!("{relative}.sha256")) {
                Ok(Some(sidecar)) if !verify_sha256(&bytes, &sidecar) => {
                    return Err(ResolutionError::ChecksumMismatch {
                        coordinate: coordinate.clone(),
                        repository: remote.id().to_string(),
                    });
                }
                Ok(_) => {}
                Err(RemoteError::Unreachable { repository, reason }) => {
                    self.sink.emit(&repository, &format!("Checksum unavailable: {reason}"));
                }
            }

            let target = self.local.path_for(coordinate);
            let descriptor = ArtifactDescriptor::from_slice(&bytes, coordinate, &target)?;
            let path = self.local.install(coordinate, &bytes, remote.id())?;
            self.sink.emit(remote.id(), &format!("Downloaded {coordinate}"));
            return Ok((path, descriptor));
        }

        if !unreachable.is_empty() {
            return Err(ResolutionError::Unreachable {
                coordinate: coordinate.clone(),
                repositories: unreachable,
            });
        }
        Err(ResolutionError::NotFound(coordinate.clone()))
    }
}

impl ArtifactResolver for RepositoryResolver {
    fn resolve(&self, root: &Coordinate) -> Result<ArtifactSet> {
        let mut chosen: HashMap<String, Coordinate> = HashMap::new();
        chosen.insert(root.versionless(), root.clone());

        let mut queue = VecDeque::from([root.clone()]);
        let mut artifacts = Vec::new();

        while let Some(coordinate) = queue.pop_front() {
            let (path, descriptor) = self.locate(&coordinate).map_err(|e| match e {
                ResolutionError::NotFound(_) | ResolutionError::Unreachable { .. }
                    if &coordinate != root =>
                {
                    ResolutionError::Unsatisfiable {
                        root: root.clone(),
                        missing: coordinate.clone(),
                        source: Box::new(e),
                    }
                }
                e => e,
            })?;

            for dependency in &descriptor.dependencies {
                let dependency = parse_dependency(dependency, &coordinate, &path)?;
                match chosen.get(&dependency.versionless()) {
                    Some(existing) => {
                        if existing != &dependency {
                            debug!(
                                kept = %existing,
                                skipped = %dependency,
                                "Skipped conflicting dependency version"
                            );
                        }
                    }
                    None => {
                        chosen.insert(dependency.versionless(), dependency.clone());
                        queue.push_back(dependency);
                    }
                }
            }

            artifacts.push(Artifact::new(coordinate, path));
        }

        debug!(root = %root, artifacts = artifacts.len(), "Resolved artifact set");
        Ok(ArtifactSet::new(root.clone(), artifacts))
    }
}

fn parse_dependency(dependency: &str, owner: &Coordinate, path: &Path) -> Result<Coordinate> {
    Coordinate::parse(dependency).map_err(|e| ResolutionError::InvalidDescriptor {
        coordinate: owner.clone(),
        path: path.to_path_buf(),
        reason: format!("invalid dependency '{dependency}': {e}"),
    })
}
