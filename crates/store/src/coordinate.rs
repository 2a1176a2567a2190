use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// `group:artifact:version` identifier of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    group: String,
    artifact: String,
    version: String,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ResolutionError> {
        let coordinate = Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn parse(input: &str) -> Result<Self, ResolutionError> {
        let parts: Vec<&str> = input.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version] => Self::new(*group, *artifact, *version).map_err(|e| match e {
                ResolutionError::MalformedCoordinate { reason, .. } => {
                    ResolutionError::MalformedCoordinate {
                        coordinate: input.to_string(),
                        reason,
                    }
                }
                other => other,
            }),
            _ => Err(ResolutionError::MalformedCoordinate {
                coordinate: input.to_string(),
                reason: format!(
                    "expected group:artifact:version, found {} part(s)",
                    parts.len()
                ),
            }),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `group:artifact`, the identity used to pick one version per dependency graph.
    pub fn versionless(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    /// Location of the descriptor relative to a repository root, always `/`-separated.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}-{}.json",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.artifact,
            self.version
        )
    }

    fn validate(&self) -> Result<(), ResolutionError> {
        let malformed = |reason: String| ResolutionError::MalformedCoordinate {
            coordinate: self.to_string(),
            reason,
        };

        for (label, part) in [
            ("group", &self.group),
            ("artifact", &self.artifact),
            ("version", &self.version),
        ] {
            if part.is_empty() {
                return Err(malformed(format!("{label} is empty")));
            }
            if let Some(c) = part
                .chars()
                .find(|c| c.is_whitespace() || matches!(c, '/' | '\\' | ':'))
            {
                return Err(malformed(format!("{label} contains invalid character {c:?}")));
            }
        }

        if self.group.split('.').any(str::is_empty) {
            return Err(malformed("group has an empty segment".to_string()));
        }
        for (label, part) in [("artifact", &self.artifact), ("version", &self.version)] {
            if part.chars().all(|c| c == '.') {
                return Err(malformed(format!("{label} cannot consist of dots only")));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Coordinate {
    type Error = ResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Coordinate> for String {
    fn from(value: Coordinate) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let coordinate: Coordinate = "org.example:ext:1.0".parse().unwrap();
        assert_eq!(coordinate.group(), "org.example");
        assert_eq!(coordinate.artifact(), "ext");
        assert_eq!(coordinate.version(), "1.0");
        assert_eq!(coordinate.to_string(), "org.example:ext:1.0");
        assert_eq!(coordinate.versionless(), "org.example:ext");
    }

    #[test]
    fn test_relative_path() {
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        assert_eq!(coordinate.relative_path(), "org/example/ext/1.0/ext-1.0.json");
    }

    #[test]
    fn test_malformed_coordinates() {
        for input in [
            "",
            "org.example:ext",
            "org.example:ext:1.0:extra",
            "org.example::1.0",
            "org..example:ext:1.0",
            "org.example:../ext:1.0",
            "org.example:ext:..",
            "org.example:e xt:1.0",
        ] {
            let err = Coordinate::parse(input).unwrap_err();
            match err {
                ResolutionError::MalformedCoordinate { coordinate, .. } => {
                    assert_eq!(coordinate, input)
                }
                other => panic!("unexpected error for {input:?}: {other}"),
            }
        }
    }

    #[test]
    fn test_serde_as_string() {
        let coordinate = Coordinate::parse("io.keystone:core:2.1.0").unwrap();
        let json = serde_json::to_string(&coordinate).unwrap();
        assert_eq!(json, "\"io.keystone:core:2.1.0\"");
        assert_eq!(serde_json::from_str::<Coordinate>(&json).unwrap(), coordinate);
        assert!(serde_json::from_str::<Coordinate>("\"broken\"").is_err());
    }
}
