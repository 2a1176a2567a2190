use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::extension::{Document, SerializationExtension, TypeBinding, TypeRegistrations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFormat {
    /// Human-readable JSON.
    Json,
    /// Compact binary encoding.
    Binary,
}

impl fmt::Display for CodecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecFormat::Json => write!(f, "json"),
            CodecFormat::Binary => write!(f, "binary"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct JsonEnvelope {
    #[serde(rename = "@type")]
    name: String,
    value: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct BinaryEnvelope {
    name: String,
    value: Vec<u8>,
}

/// A value decoded from a name-tagged payload.
pub struct Tagged {
    name: String,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl Tagged {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast<T: 'static>(self) -> Result<T> {
        let actual = self.type_name;
        self.value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CodecError::TypeMismatch {
                expected: type_name::<T>(),
                actual,
            })
    }
}

impl fmt::Debug for Tagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tagged")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// An encode/decode engine whose known types are extended at runtime.
///
/// Registration takes `&self` so a codec can be shared behind an `Arc`. Types are
/// only ever added; registering a name again rebinds it to the newest type.
pub struct Codec {
    format: CodecFormat,
    by_type: DashMap<TypeId, Arc<TypeBinding>>,
    by_name: DashMap<String, Arc<TypeBinding>>,
    extensions: Mutex<Vec<String>>,
}

impl Codec {
    pub fn new(format: CodecFormat) -> Self {
        Self {
            format,
            by_type: DashMap::new(),
            by_name: DashMap::new(),
            extensions: Mutex::new(Vec::new()),
        }
    }

    pub fn json() -> Self {
        Self::new(CodecFormat::Json)
    }

    pub fn binary() -> Self {
        Self::new(CodecFormat::Binary)
    }

    pub fn format(&self) -> CodecFormat {
        self.format
    }

    /// Registers every type declared by `extension` and returns how many there were.
    ///
    /// Registering the same extension twice records it twice; the types themselves are
    /// simply rebound.
    pub fn register_extension(&self, extension: &dyn SerializationExtension) -> Result<usize> {
        let mut types = TypeRegistrations::new();
        extension.setup(&mut types);
        let bindings = types.into_bindings();

        if let Some(invalid) = bindings.iter().find(|b| b.name.trim().is_empty()) {
            return Err(CodecError::InvalidTypeName {
                extension: extension.name().to_string(),
                type_name: invalid.type_name,
            });
        }

        let count = bindings.len();
        for binding in bindings {
            let binding = Arc::new(binding);
            if let Some(previous) = self.by_name.insert(binding.name.clone(), binding.clone()) {
                if previous.type_id != binding.type_id {
                    debug!(
                        codec = %self.format,
                        name = %binding.name,
                        previous = previous.type_name,
                        current = binding.type_name,
                        "Rebinding type name"
                    );
                }
                self.release_type(&previous);
            }
            if !binding.document {
                self.by_type.insert(binding.type_id, binding);
            }
        }

        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(extension.name().to_string());
        debug!(
            codec = %self.format,
            extension = extension.name(),
            types = count,
            "Registered serialization extension"
        );
        Ok(count)
    }

    /// Names of registered extensions, in registration order.
    pub fn registered_extensions(&self) -> Vec<String> {
        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of all encodable types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn encode<T: 'static>(&self, value: &T) -> Result<Vec<u8>> {
        let binding = self.binding_for::<T>()?;
        self.encode_with(&binding, value)
    }

    pub fn decode<T: 'static>(&self, bytes: &[u8]) -> Result<T> {
        let binding = self.binding_for::<T>()?;
        let value = self.decode_with(&binding, bytes)?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CodecError::TypeMismatch {
                expected: type_name::<T>(),
                actual: binding.type_name,
            })
    }

    /// Encodes `value` together with its registered name.
    pub fn encode_tagged<T: 'static>(&self, value: &T) -> Result<Vec<u8>> {
        let binding = self.binding_for::<T>()?;
        let body = self.encode_with(&binding, value)?;
        self.envelope(&binding.name, body)
    }

    /// Encodes a [`Document`] under its own name, which must have been registered with
    /// [`TypeRegistrations::register_document`](crate::TypeRegistrations::register_document).
    pub fn encode_document(&self, document: &Document) -> Result<Vec<u8>> {
        let binding = self
            .by_name
            .get(document.name())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CodecError::UnknownTypeName(document.name().to_string()))?;
        if !binding.document {
            return Err(CodecError::TypeMismatch {
                expected: binding.type_name,
                actual: type_name::<Document>(),
            });
        }
        let body = self.encode_with(&binding, document)?;
        self.envelope(&binding.name, body)
    }

    /// Decodes a payload written by [`Codec::encode_tagged`], picking the type by name.
    pub fn decode_tagged(&self, bytes: &[u8]) -> Result<Tagged> {
        let (name, body) = match self.format {
            CodecFormat::Json => {
                let envelope: JsonEnvelope = serde_json::from_slice(bytes)?;
                (envelope.name, serde_json::to_vec(&envelope.value)?)
            }
            CodecFormat::Binary => {
                let envelope: BinaryEnvelope = bincode::deserialize(bytes)?;
                (envelope.name, envelope.value)
            }
        };

        let binding = self
            .by_name
            .get(&name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CodecError::UnknownTypeName(name.clone()))?;
        let mut value = self.decode_with(&binding, &body)?;
        if binding.document {
            let body = value
                .downcast::<serde_json::Value>()
                .map_err(|_| CodecError::TypeMismatch {
                    expected: type_name::<serde_json::Value>(),
                    actual: binding.type_name,
                })?;
            value = Box::new(Document::new(name.clone(), *body));
        }
        Ok(Tagged {
            name,
            type_name: binding.type_name,
            value,
        })
    }

    fn envelope(&self, name: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        match self.format {
            CodecFormat::Json => Ok(serde_json::to_vec(&JsonEnvelope {
                name: name.to_string(),
                value: serde_json::from_slice(&body)?,
            })?),
            CodecFormat::Binary => Ok(bincode::serialize(&BinaryEnvelope {
                name: name.to_string(),
                value: body,
            })?),
        }
    }

    /// Drops `previous` from the type index once its name points elsewhere.
    ///
    /// The type stays encodable when another name is still bound to it.
    fn release_type(&self, previous: &Arc<TypeBinding>) {
        if previous.document {
            return;
        }
        let indexed = self
            .by_type
            .get(&previous.type_id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), previous));
        if !indexed {
            return;
        }

        let survivor = self
            .by_name
            .iter()
            .find(|entry| !entry.value().document && entry.value().type_id == previous.type_id)
            .map(|entry| entry.value().clone());
        match survivor {
            Some(binding) => {
                self.by_type.insert(previous.type_id, binding);
            }
            None => {
                self.by_type.remove(&previous.type_id);
            }
        }
    }

    fn binding_for<T: 'static>(&self) -> Result<Arc<TypeBinding>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|entry| entry.value().clone())
            .ok_or(CodecError::UnregisteredType(type_name::<T>()))
    }

    fn encode_with(&self, binding: &TypeBinding, value: &dyn Any) -> Result<Vec<u8>> {
        let (encode, _) = match self.format {
            CodecFormat::Json => binding.json,
            CodecFormat::Binary => binding.binary,
        };
        encode(value)
    }

    fn decode_with(&self, binding: &TypeBinding, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        let (_, decode) = match self.format {
            CodecFormat::Json => binding.json,
            CodecFormat::Binary => binding.binary,
        };
        decode(bytes)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("format", &self.format)
            .field("types", &self.registered_types())
            .field("extensions", &self.registered_extensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Segment {
        id: String,
        rows: u64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Interval {
        start: i64,
        end: i64,
    }

    struct StorageTypes;

    impl SerializationExtension for StorageTypes {
        fn name(&self) -> &str {
            "storage-types"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types
                .register::<Segment>("segment")
                .register::<Interval>("interval");
        }
    }

    /// Registers `T` under a single name; used to rebind names across extensions.
    struct Alias<T> {
        name: &'static str,
        _type: std::marker::PhantomData<fn() -> T>,
    }

    fn alias<T>(name: &'static str) -> Alias<T> {
        Alias {
            name,
            _type: std::marker::PhantomData,
        }
    }

    impl<T> SerializationExtension for Alias<T>
    where
        T: Serialize + serde::de::DeserializeOwned + Send + 'static,
    {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register::<T>(self.name);
        }
    }

    struct Events;

    impl SerializationExtension for Events {
        fn name(&self) -> &str {
            "events"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register_document("event").register::<Segment>("segment");
        }
    }

    struct Nameless;

    impl SerializationExtension for Nameless {
        fn name(&self) -> &str {
            "nameless"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register::<Segment>(" ");
        }
    }

    fn segment() -> Segment {
        Segment {
            id: "wiki_2013".to_string(),
            rows: 42,
        }
    }

    #[test]
    fn test_unregistered_type_is_rejected() {
        let codec = Codec::json();
        assert!(matches!(
            codec.encode(&segment()),
            Err(CodecError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_round_trip_in_both_formats() {
        for codec in [Codec::json(), Codec::binary()] {
            assert_eq!(codec.register_extension(&StorageTypes).unwrap(), 2);
            let bytes = codec.encode(&segment()).unwrap();
            assert_eq!(codec.decode::<Segment>(&bytes).unwrap(), segment());
        }
    }

    #[test]
    fn test_json_is_human_readable() {
        let codec = Codec::json();
        codec.register_extension(&StorageTypes).unwrap();
        let text = String::from_utf8(codec.encode_tagged(&segment()).unwrap()).unwrap();
        assert!(text.contains("\"@type\":\"segment\""));
        assert!(text.contains("wiki_2013"));
    }

    #[test]
    fn test_tagged_round_trip() {
        for codec in [Codec::json(), Codec::binary()] {
            codec.register_extension(&StorageTypes).unwrap();
            let bytes = codec.encode_tagged(&Interval { start: 1, end: 5 }).unwrap();
            let tagged = codec.decode_tagged(&bytes).unwrap();
            assert_eq!(tagged.name(), "interval");
            assert!(tagged.is::<Interval>());
            assert!(matches!(
                codec.decode_tagged(&bytes).unwrap().downcast::<Segment>(),
                Err(CodecError::TypeMismatch { .. })
            ));
            assert_eq!(
                tagged.downcast::<Interval>().unwrap(),
                Interval { start: 1, end: 5 }
            );
        }
    }

    #[test]
    fn test_duplicate_registration_is_recorded() {
        let codec = Codec::binary();
        codec.register_extension(&StorageTypes).unwrap();
        codec.register_extension(&StorageTypes).unwrap();
        assert_eq!(
            codec.registered_extensions(),
            vec!["storage-types", "storage-types"]
        );
        assert_eq!(codec.registered_types(), vec!["interval", "segment"]);
    }

    #[test]
    fn test_blank_type_name_is_rejected() {
        let codec = Codec::json();
        assert!(matches!(
            codec.register_extension(&Nameless),
            Err(CodecError::InvalidTypeName { .. })
        ));
        assert!(codec.registered_extensions().is_empty());
    }

    #[test]
    fn test_rebinding_one_alias_keeps_the_type_encodable() {
        for codec in [Codec::json(), Codec::binary()] {
            codec.register_extension(&alias::<Segment>("a")).unwrap();
            codec.register_extension(&alias::<Segment>("b")).unwrap();
            codec.register_extension(&alias::<Interval>("b")).unwrap();

            assert_eq!(codec.registered_types(), vec!["a", "b"]);
            assert!(codec.is_registered::<Segment>());
            assert!(codec.is_registered::<Interval>());

            let bytes = codec.encode_tagged(&segment()).unwrap();
            let tagged = codec.decode_tagged(&bytes).unwrap();
            assert_eq!(tagged.name(), "a");
            assert_eq!(tagged.downcast::<Segment>().unwrap(), segment());

            let bytes = codec.encode_tagged(&Interval { start: 0, end: 1 }).unwrap();
            assert_eq!(codec.decode_tagged(&bytes).unwrap().name(), "b");
        }
    }

    #[test]
    fn test_rebinding_the_only_name_drops_the_type() {
        let codec = Codec::json();
        codec.register_extension(&alias::<Segment>("a")).unwrap();
        codec.register_extension(&alias::<Interval>("a")).unwrap();

        assert!(!codec.is_registered::<Segment>());
        assert!(matches!(
            codec.encode(&segment()),
            Err(CodecError::UnregisteredType(_))
        ));
        assert!(codec.is_registered::<Interval>());
    }

    #[test]
    fn test_documents_round_trip_by_name() {
        for codec in [Codec::json(), Codec::binary()] {
            codec.register_extension(&Events).unwrap();
            let event = Document::new("event", serde_json::json!({"kind": "click", "count": 3}));

            let bytes = codec.encode_document(&event).unwrap();
            let tagged = codec.decode_tagged(&bytes).unwrap();
            assert_eq!(tagged.name(), "event");
            assert_eq!(tagged.downcast::<Document>().unwrap(), event);

            assert!(!codec.is_registered::<Document>());
            assert!(matches!(
                codec.encode_document(&Document::new("segment", serde_json::Value::Null)),
                Err(CodecError::TypeMismatch { .. })
            ));
            assert!(matches!(
                codec.encode_document(&Document::new("unknown", serde_json::Value::Null)),
                Err(CodecError::UnknownTypeName(_))
            ));
        }
    }

    #[test]
    fn test_document_replacing_a_typed_name() {
        let codec = Codec::json();
        codec.register_extension(&alias::<Segment>("event")).unwrap();
        codec.register_extension(&Events).unwrap();

        // "segment" still names the type
        assert!(codec.is_registered::<Segment>());
        let bytes = codec.encode_tagged(&segment()).unwrap();
        assert_eq!(codec.decode_tagged(&bytes).unwrap().name(), "segment");
    }
}
