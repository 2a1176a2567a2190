use std::path::{Path, PathBuf};

use crate::coordinate::Coordinate;

/// One resolved artifact: its coordinate and the local file holding its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    coordinate: Coordinate,
    file: PathBuf,
}

impl Artifact {
    pub fn new(coordinate: Coordinate, file: impl Into<PathBuf>) -> Self {
        Self {
            coordinate,
            file: file.into(),
        }
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn group(&self) -> &str {
        self.coordinate.group()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// The dependency closure of one coordinate, root first, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    root: Coordinate,
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn new(root: Coordinate, artifacts: Vec<Artifact>) -> Self {
        Self { root, artifacts }
    }

    pub fn root(&self) -> &Coordinate {
        &self.root
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl IntoIterator for ArtifactSet {
    type Item = Artifact;
    type IntoIter = std::vec::IntoIter<Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}
