use std::path::PathBuf;

use keystone_store::Coordinate;

use crate::guest::GuestError;

pub type Result<T> = std::result::Result<T, ExtensionLoadError>;

/// Failure to load an extension from an already resolved artifact set.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionLoadError {
    /// An artifact file could not be read or does not describe the artifact it was
    /// resolved for.
    #[error("Unreadable artifact[{coordinate}] at '{path}': {reason}")]
    UnreadableArtifact {
        coordinate: Coordinate,
        path: PathBuf,
        reason: String,
    },

    /// A declared provider type is neither defined by the extension nor by the host.
    #[error("Provider type[{type_name}] declared in context[{context}] cannot be resolved")]
    MissingType { type_name: String, context: String },

    /// The code carried by an artifact is not a valid WebAssembly module.
    #[error("Invalid module in artifact[{coordinate}]: {source}")]
    InvalidModule {
        coordinate: Coordinate,
        #[source]
        source: wasmtime::Error,
    },

    /// The WebAssembly runtime could not be set up.
    #[error("Failed to set up the extension runtime: {0}")]
    Runtime(#[source] wasmtime::Error),

    /// Extension code failed to create a provider instance.
    #[error("Provider type[{type_name}] from {origin} failed to instantiate: {source}")]
    Guest {
        type_name: String,
        origin: String,
        #[source]
        source: GuestError,
    },

    /// The provider type resolves, but neither its artifact nor the host implements it.
    #[error("Provider type[{type_name}] from {origin} has no implementation")]
    MissingImplementation { type_name: String, origin: String },
}
