pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The Rust type was never registered on this codec.
    #[error("type[{0}] is not registered on this codec")]
    UnregisteredType(&'static str),

    /// A tagged payload named a type this codec does not know.
    #[error("unknown type name[{0}]")]
    UnknownTypeName(String),

    /// An extension tried to register a type under an unusable name.
    #[error("extension[{extension}] registered type[{type_name}] under an empty name")]
    InvalidTypeName {
        extension: String,
        type_name: &'static str,
    },

    /// A decoded value was requested as a different type than it was encoded with.
    #[error("expected a value of type[{expected}], found type[{actual}]")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Binary(#[from] bincode::Error),
}
