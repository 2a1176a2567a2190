use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinate::Coordinate;
use crate::descriptor::{ArtifactDescriptor, sha256_hex};
use crate::error::{ResolutionError, Result};

const ORIGIN_SUFFIX: &str = ".keystone-origin";

/// Where a cached descriptor came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OriginRecord {
    pub repository: String,
    pub fetched_at: DateTime<Utc>,
    pub sha256: String,
}

/// On-disk cache of artifact descriptors, laid out like a remote repository.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, coordinate: &Coordinate) -> PathBuf {
        coordinate
            .relative_path()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Returns the cached descriptor for `coordinate`, if any.
    pub fn find(&self, coordinate: &Coordinate) -> Result<Option<(PathBuf, ArtifactDescriptor)>> {
        let path = self.path_for(coordinate);
        if !path.is_file() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| ResolutionError::io("read cached descriptor", &path, e))?;
        let descriptor = ArtifactDescriptor::from_slice(&bytes, coordinate, &path)?;
        Ok(Some((path, descriptor)))
    }

    /// Stores a fetched descriptor and records its origin.
    pub fn install(&self, coordinate: &Coordinate, bytes: &[u8], repository: &str) -> Result<PathBuf> {
        let path = self.path_for(coordinate);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ResolutionError::io("create cache directory", parent, e))?;
        }

        // Write next to the target and rename, so a partial write never looks cached.
        let partial = with_suffix(&path, ".part");
        fs::write(&partial, bytes).map_err(|e| ResolutionError::io("write descriptor", &partial, e))?;
        fs::rename(&partial, &path).map_err(|e| ResolutionError::io("move descriptor", &path, e))?;

        let origin = OriginRecord {
            repository: repository.to_string(),
            fetched_at: Utc::now(),
            sha256: sha256_hex(bytes),
        };
        let origin_path = with_suffix(&path, ORIGIN_SUFFIX);
        let content = serde_json::to_vec_pretty(&origin).map_err(|e| {
            ResolutionError::io("encode origin record", &origin_path, std::io::Error::other(e))
        })?;
        fs::write(&origin_path, content)
            .map_err(|e| ResolutionError::io("write origin record", &origin_path, e))?;

        debug!(coordinate = %coordinate, path = %path.display(), "Cached artifact descriptor");
        Ok(path)
    }

    /// Origin of a cached descriptor; `None` for descriptors placed in the cache by hand.
    pub fn origin(&self, coordinate: &Coordinate) -> Option<OriginRecord> {
        let content = fs::read(with_suffix(&self.path_for(coordinate), ORIGIN_SUFFIX)).ok()?;
        serde_json::from_slice(&content).ok()
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
