use std::path::PathBuf;

use keystone_codec::CodecError;
use keystone_engine::ExtensionLoadError;
use keystone_inject::InjectError;
use keystone_store::ResolutionError;

/// Failure to load or bind runtime properties.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load runtime properties from '{path}': {source}")]
    Load {
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("Invalid configuration at [{prefix}]: {reason}")]
    Invalid { prefix: String, reason: String },
}

/// An input handed to the module composer could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("Unrecognized module input of type[{type_name}]")]
    UnrecognizedInput { type_name: &'static str },

    #[error("Module class[{type_name}] is not bound in the minimal container")]
    UnboundClass { type_name: &'static str },

    #[error("Failed to prepare module[{module}]: {source}")]
    Injection {
        module: &'static str,
        source: InjectError,
    },

    #[error("Minimal container has no [{qualifier}] codec: {source}")]
    MissingCodec {
        qualifier: &'static str,
        source: InjectError,
    },

    #[error("Failed to register serialization extensions of module[{module}]: {source}")]
    Codec {
        module: &'static str,
        source: CodecError,
    },
}

/// Any failure that aborts a bootstrap run.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create the {phase} container: {source}")]
    Container {
        phase: &'static str,
        source: InjectError,
    },

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error("Failed to resolve extension[{coordinate}]: {source}")]
    Resolution {
        coordinate: String,
        source: ResolutionError,
    },

    #[error("Failed to load extension[{coordinate}]: {source}")]
    ExtensionLoad {
        coordinate: String,
        source: ExtensionLoadError,
    },

    #[error("Failed to add a module of extension[{coordinate}]: {source}")]
    ExtensionModule {
        coordinate: String,
        source: CompositionError,
    },
}

impl BootstrapError {
    /// The extension coordinate that triggered the error, if any.
    pub fn coordinate(&self) -> Option<&str> {
        match self {
            BootstrapError::Resolution { coordinate, .. }
            | BootstrapError::ExtensionLoad { coordinate, .. }
            | BootstrapError::ExtensionModule { coordinate, .. } => Some(coordinate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_trigger() {
        let err = BootstrapError::Composition(CompositionError::UnrecognizedInput {
            type_name: "u32",
        });
        assert_eq!(err.to_string(), "Unrecognized module input of type[u32]");
        assert_eq!(err.coordinate(), None);

        let err = BootstrapError::Resolution {
            coordinate: "org.example:ext:1.0".to_string(),
            source: ResolutionError::InvalidRepository {
                location: "ftp://x".to_string(),
                reason: "unsupported scheme".to_string(),
            },
        };
        assert!(err.to_string().contains("extension[org.example:ext:1.0]"));
        assert_eq!(err.coordinate(), Some("org.example:ext:1.0"));
    }
}
