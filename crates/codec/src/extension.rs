use std::any::{Any, TypeId, type_name};
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CodecError, Result};

pub(crate) type EncodeFn = fn(&dyn Any) -> Result<Vec<u8>>;
pub(crate) type DecodeFn = fn(&[u8]) -> Result<Box<dyn Any + Send>>;

/// A bundle of type registrations applied to a codec as one unit.
///
/// An extension is format independent: the same extension is registered on the JSON
/// and on the binary codec.
pub trait SerializationExtension: Send + Sync {
    /// Identity of the extension, recorded by every codec it is registered on.
    fn name(&self) -> &str;

    /// Declares the types this extension makes encodable.
    fn setup(&self, types: &mut TypeRegistrations);
}

/// How one Rust type is encoded in every supported format.
pub struct TypeBinding {
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) document: bool,
    pub(crate) json: (EncodeFn, DecodeFn),
    pub(crate) binary: (EncodeFn, DecodeFn),
}

impl TypeBinding {
    pub fn of<T>(name: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            document: false,
            json: (encode_json::<T> as EncodeFn, decode_json::<T> as DecodeFn),
            binary: (encode_binary::<T> as EncodeFn, decode_binary::<T> as DecodeFn),
        }
    }

    /// A type known only by name, whose values are carried as [`Document`]s.
    ///
    /// The body is JSON in both formats.
    pub fn document(name: impl Into<String>) -> Self {
        let codec = (encode_document as EncodeFn, decode_json::<serde_json::Value> as DecodeFn);
        Self {
            name: name.into(),
            type_id: TypeId::of::<Document>(),
            type_name: type_name::<Document>(),
            document: true,
            json: codec,
            binary: codec,
        }
    }

    /// Stable name used to tag polymorphic payloads.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_document(&self) -> bool {
        self.document
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("document", &self.document)
            .finish()
    }
}

/// A value of a type that has no Rust counterpart in the host, such as one declared
/// by extension code.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    name: String,
    value: serde_json::Value,
}

impl Document {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }
}

/// Collects the types declared by a [`SerializationExtension`].
#[derive(Debug, Default)]
pub struct TypeRegistrations {
    bindings: Vec<TypeBinding>,
}

impl TypeRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, name: impl Into<String>) -> &mut Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.bindings.push(TypeBinding::of::<T>(name));
        self
    }

    /// Declares a type by name only. See [`Document`].
    pub fn register_document(&mut self, name: impl Into<String>) -> &mut Self {
        self.bindings.push(TypeBinding::document(name));
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn into_bindings(self) -> Vec<TypeBinding> {
        self.bindings
    }
}

fn downcast<T: 'static>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or(CodecError::TypeMismatch {
        expected: type_name::<T>(),
        actual: "<erased>",
    })
}

fn encode_json<T: Serialize + 'static>(value: &dyn Any) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(downcast::<T>(value)?)?)
}

fn decode_json<T: DeserializeOwned + Send + 'static>(bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
    Ok(Box::new(serde_json::from_slice::<T>(bytes)?))
}

fn encode_document(value: &dyn Any) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(downcast::<Document>(value)?.value())?)
}

fn encode_binary<T: Serialize + 'static>(value: &dyn Any) -> Result<Vec<u8>> {
    Ok(bincode::serialize(downcast::<T>(value)?)?)
}

fn decode_binary<T: DeserializeOwned + Send + 'static>(
    bytes: &[u8],
) -> Result<Box<dyn Any + Send>> {
    Ok(Box::new(bincode::deserialize::<T>(bytes)?))
}
