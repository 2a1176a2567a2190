use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::coordinate::Coordinate;
use crate::error::{ResolutionError, Result};

/// Contents of an artifact file.
///
/// Besides its own identity an artifact lists the coordinates it depends on, the type
/// names it defines and, per service capability, the provider types it offers. An
/// artifact that implements types of its own carries a base64 encoded WebAssembly
/// module.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub services: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl ArtifactDescriptor {
    pub fn new(coordinate: &Coordinate) -> Self {
        Self {
            group: coordinate.group().to_string(),
            artifact: coordinate.artifact().to_string(),
            version: coordinate.version().to_string(),
            dependencies: Vec::new(),
            exports: Vec::new(),
            services: BTreeMap::new(),
            module: None,
        }
    }

    pub fn with_dependency(mut self, coordinate: impl Into<String>) -> Self {
        self.dependencies.push(coordinate.into());
        self
    }

    pub fn with_export(mut self, type_name: impl Into<String>) -> Self {
        self.exports.push(type_name.into());
        self
    }

    /// Declares `type_name` as a provider for `capability`. The type is exported too.
    pub fn with_service(mut self, capability: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        if !self.exports.contains(&type_name) {
            self.exports.push(type_name.clone());
        }
        self.services
            .entry(capability.into())
            .or_default()
            .push(type_name);
        self
    }

    /// Attaches the artifact's code.
    pub fn with_module(mut self, module: impl AsRef<[u8]>) -> Self {
        self.module = Some(STANDARD.encode(module));
        self
    }

    /// Decoded module bytes, if the artifact carries code.
    pub fn module_bytes(&self) -> std::result::Result<Option<Vec<u8>>, base64::DecodeError> {
        self.module
            .as_deref()
            .map(|encoded| STANDARD.decode(encoded))
            .transpose()
    }

    pub fn coordinate(&self) -> Result<Coordinate> {
        Coordinate::new(&self.group, &self.artifact, &self.version)
    }

    /// Parses a descriptor and checks that it describes `expected`.
    pub fn from_slice(bytes: &[u8], expected: &Coordinate, path: &Path) -> Result<Self> {
        let invalid = |reason: String| ResolutionError::InvalidDescriptor {
            coordinate: expected.clone(),
            path: path.to_path_buf(),
            reason,
        };

        let descriptor: ArtifactDescriptor =
            serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
        let declared = descriptor.coordinate().map_err(|e| invalid(e.to_string()))?;
        if &declared != expected {
            return Err(invalid(format!("descriptor declares [{declared}]")));
        }
        Ok(descriptor)
    }

    /// Reads the descriptor stored at `path` without checking its identity.
    pub fn read(path: &Path) -> std::result::Result<Self, DescriptorReadError> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Providers declared for `capability`, in declaration order.
    pub fn providers(&self, capability: &str) -> &[String] {
        self.services
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Checks `data` against the content of a `.sha256` sidecar file.
///
/// The sidecar may carry a file name after the digest, as `sha256sum` writes it.
pub fn verify_sha256(data: &[u8], sidecar: &[u8]) -> bool {
    let expected = String::from_utf8_lossy(sidecar);
    match expected.split_whitespace().next() {
        Some(digest) => digest.eq_ignore_ascii_case(&sha256_hex(data)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_service_exports_provider() {
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let descriptor = ArtifactDescriptor::new(&coordinate)
            .with_export("org.example.ext.Foo")
            .with_service("cap", "org.example.ext.FooModule");

        assert_eq!(
            descriptor.exports,
            vec!["org.example.ext.Foo", "org.example.ext.FooModule"]
        );
        assert_eq!(descriptor.providers("cap"), ["org.example.ext.FooModule"]);
        assert!(descriptor.providers("other").is_empty());
    }

    #[test]
    fn test_from_slice_rejects_other_identity() {
        let expected = Coordinate::parse("org.example:ext:1.0").unwrap();
        let other = Coordinate::parse("org.example:ext:2.0").unwrap();
        let bytes = ArtifactDescriptor::new(&other).to_json_pretty().unwrap();

        let err = ArtifactDescriptor::from_slice(bytes.as_bytes(), &expected, Path::new("x.json"))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidDescriptor { .. }));

        let bytes = ArtifactDescriptor::new(&expected).to_json_pretty().unwrap();
        ArtifactDescriptor::from_slice(bytes.as_bytes(), &expected, Path::new("x.json")).unwrap();
    }

    #[test]
    fn test_module_is_optional() {
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let plain = ArtifactDescriptor::new(&coordinate);
        assert_eq!(plain.module_bytes().unwrap(), None);
        assert!(!plain.to_json_pretty().unwrap().contains("module"));

        let with_code = plain.with_module(b"\0asm");
        assert_eq!(with_code.module_bytes().unwrap(), Some(b"\0asm".to_vec()));

        let mut broken = with_code.clone();
        broken.module = Some("not base64!".to_string());
        assert!(broken.module_bytes().is_err());
    }

    #[test]
    fn test_verify_sha256() {
        let data = b"descriptor";
        let digest = sha256_hex(data);
        assert!(verify_sha256(data, digest.as_bytes()));
        assert!(verify_sha256(data, format!("{}  ext-1.0.json\n", digest.to_uppercase()).as_bytes()));
        assert!(!verify_sha256(b"tampered", digest.as_bytes()));
        assert!(!verify_sha256(data, b""));
    }
}
