use crate::key::Key;

pub type Result<T> = std::result::Result<T, InjectError>;

/// Errors raised while building or querying an [`Injector`](crate::Injector).
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// Two modules (or one module twice) bound the same key.
    #[error("{key} is already bound by module[{first}], rebound by module[{second}]")]
    DuplicateBinding {
        key: Key,
        first: &'static str,
        second: &'static str,
    },

    /// A module reported a problem while declaring its bindings.
    #[error("module[{module}] failed to configure: {message}")]
    Configuration {
        module: &'static str,
        message: String,
    },

    /// No binding exists for the requested key.
    #[error("no binding for {0}")]
    Unbound(Key),

    /// A type was constructed from the injector without being bound as constructible.
    #[error("type[{0}] is not bound as constructible")]
    UnboundClass(&'static str),

    /// Resolving a key required resolving the same key again.
    #[error("circular dependency while resolving {key}, path: {path}")]
    CircularDependency { key: Key, path: String },

    /// A provider for the key returned a value of an unexpected type.
    #[error("binding for {0} produced a value of the wrong type")]
    TypeMismatch(Key),

    /// A provider or member injection failed.
    #[error("failed to provide {key}: {message}")]
    Provision { key: Key, message: String },
}
