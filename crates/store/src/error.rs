use std::path::PathBuf;

use thiserror::Error;

use crate::coordinate::Coordinate;

/// Failure to turn a coordinate into an artifact set.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Malformed coordinate[{coordinate}]: {reason}")]
    MalformedCoordinate { coordinate: String, reason: String },

    #[error("Artifact[{0}] not found in the local repository or any remote repository")]
    NotFound(Coordinate),

    #[error("Artifact[{coordinate}] could not be fetched, unreachable repositories: {list}", list = .repositories.join(", "))]
    Unreachable {
        coordinate: Coordinate,
        repositories: Vec<String>,
    },

    #[error("Dependency[{missing}] of [{root}] cannot be satisfied: {source}")]
    Unsatisfiable {
        root: Coordinate,
        missing: Coordinate,
        source: Box<ResolutionError>,
    },

    #[error("Invalid descriptor for [{coordinate}] at '{path}': {reason}")]
    InvalidDescriptor {
        coordinate: Coordinate,
        path: PathBuf,
        reason: String,
    },

    #[error("Checksum verification failed for [{coordinate}] from repository[{repository}]")]
    ChecksumMismatch {
        coordinate: Coordinate,
        repository: String,
    },

    #[error("Invalid repository location[{location}]: {reason}")]
    InvalidRepository { location: String, reason: String },

    #[error("IO operation '{operation}' failed on path '{path}': {source}")]
    Io {
        operation: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResolutionError>;

impl ResolutionError {
    pub(crate) fn io(operation: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResolutionError::Io {
            operation: operation.to_string(),
            path: path.into(),
            source,
        }
    }

    /// The coordinate the error is about, when there is a parsed one.
    pub fn coordinate(&self) -> Option<&Coordinate> {
        match self {
            ResolutionError::NotFound(coordinate)
            | ResolutionError::Unreachable { coordinate, .. }
            | ResolutionError::InvalidDescriptor { coordinate, .. }
            | ResolutionError::ChecksumMismatch { coordinate, .. } => Some(coordinate),
            ResolutionError::Unsatisfiable { root, .. } => Some(root),
            _ => None,
        }
    }
}

/// Failure reported by a single remote repository.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("repository[{repository}] is unreachable: {reason}")]
    Unreachable { repository: String, reason: String },
}
