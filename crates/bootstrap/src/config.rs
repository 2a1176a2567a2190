use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Properties file read when no other file is given. A missing file is not an error.
pub const PROPERTIES_FILE: &str = "runtime.toml";

/// Environment variables starting with `KEYSTONE__` override properties, with `__`
/// separating key segments: `KEYSTONE__EXTENSIONS__COORDINATES` sets
/// `keystone.extensions.coordinates`.
pub const ENV_PREFIX: &str = "KEYSTONE";

/// Property prefix of [`ExtensionsConfig`].
pub const EXTENSIONS_PREFIX: &str = "keystone.extensions";

const LIST_KEYS: [&str; 2] = [
    "keystone.extensions.coordinates",
    "keystone.extensions.remote_repositories",
];

/// Layered runtime properties: a properties file overridden by the environment.
#[derive(Debug, Clone)]
pub struct RuntimeProperties {
    source: Option<PathBuf>,
    config: Config,
}

impl RuntimeProperties {
    /// Loads `file` (or [`PROPERTIES_FILE`]) and the `KEYSTONE__*` environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(PROPERTIES_FILE));

        let config = Config::builder()
            .add_source(File::from(path.as_path()).required(false))
            .add_source(environment())
            .build()
            .map_err(|source| ConfigError::Load {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), exists = path.is_file(), "Loaded runtime properties");
        Ok(Self {
            source: Some(path),
            config,
        })
    }

    /// Properties from an in-memory document, without environment overrides.
    pub fn from_document(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(content, format))
            .build()
            .map_err(|source| ConfigError::Load {
                path: PathBuf::from("<memory>"),
                source,
            })?;
        Ok(Self {
            source: None,
            config,
        })
    }

    /// File the properties were loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Reads the value at `key`; `None` when the key is not set.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.config.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(ConfigError::Invalid {
                prefix: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn environment() -> Environment {
    LIST_KEYS.into_iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .keep_prefix(true)
            .try_parsing(true)
            .list_separator(","),
        |environment, key| environment.with_list_parse_key(key),
    )
}

/// Binds typed configuration objects to property prefixes.
///
/// The properties under a prefix are turned into a JSON object and deserialized, so
/// `#[serde(default)]` fills in anything not configured.
#[derive(Debug, Clone)]
pub struct JsonConfigurator {
    properties: Arc<RuntimeProperties>,
}

impl JsonConfigurator {
    pub fn new(properties: Arc<RuntimeProperties>) -> Self {
        Self { properties }
    }

    pub fn configurate<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigError> {
        let value = self
            .properties
            .get::<serde_json::Value>(prefix)?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        serde_json::from_value(value).map_err(|e| ConfigError::Invalid {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Which extensions to load and where to find them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Extension coordinates, loaded in this order.
    pub coordinates: Vec<String>,
    pub local_repository: PathBuf,
    pub remote_repositories: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            coordinates: Vec::new(),
            local_repository: default_local_repository(),
            remote_repositories: Vec::new(),
        }
    }
}

/// The local repository under the platform data directory.
pub fn default_local_repository() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("io", "keystone", "keystone") {
        proj_dirs.data_dir().join("repository")
    } else {
        PathBuf::from(".keystone").join("repository")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configurator(toml: &str) -> JsonConfigurator {
        JsonConfigurator::new(Arc::new(
            RuntimeProperties::from_document(toml, FileFormat::Toml).unwrap(),
        ))
    }

    #[test]
    fn test_extensions_config_defaults() {
        let config: ExtensionsConfig = configurator("").configurate(EXTENSIONS_PREFIX).unwrap();
        assert!(config.coordinates.is_empty());
        assert!(config.remote_repositories.is_empty());
        assert_eq!(config.local_repository, default_local_repository());
        assert!(config.local_repository.ends_with("repository"));
    }

    #[test]
    fn test_extensions_config_from_properties() {
        let config: ExtensionsConfig = configurator(
            r#"
            [keystone.extensions]
            coordinates = ["org.example:ext:1.0", "org.example:other:2.0"]
            local_repository = "/tmp/keystone/repository"
            "#,
        )
        .configurate(EXTENSIONS_PREFIX)
        .unwrap();

        assert_eq!(
            config.coordinates,
            vec!["org.example:ext:1.0", "org.example:other:2.0"]
        );
        assert_eq!(config.local_repository, PathBuf::from("/tmp/keystone/repository"));
        assert!(config.remote_repositories.is_empty());
    }

    #[test]
    fn test_invalid_section() {
        let result = configurator(
            r#"
            [keystone.extensions]
            coordinates = 5
            "#,
        )
        .configurate::<ExtensionsConfig>(EXTENSIONS_PREFIX);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_properties_file_is_tolerated() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        let properties = RuntimeProperties::load(Some(path.as_path())).unwrap();
        assert_eq!(properties.source(), Some(path.as_path()));
        assert_eq!(properties.get::<String>("nothing.here").unwrap(), None);
    }

    #[test]
    fn test_properties_file_is_read() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("runtime.toml");
        std::fs::write(&path, "[service]\nname = \"catalog\"\n").unwrap();

        let properties = RuntimeProperties::load(Some(path.as_path())).unwrap();
        assert_eq!(
            properties.get::<String>("service.name").unwrap(),
            Some("catalog".to_string())
        );
    }
}
