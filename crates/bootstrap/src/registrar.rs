use keystone_codec::{Codec, CodecError};
use keystone_extension::ProviderModule;
use tracing::debug;

/// Registers every serialization extension of `provider` on both codecs.
///
/// Each extension goes to the JSON codec and then to the binary codec before the next
/// one is looked at. Nothing is deduplicated here: a provider that returns the same
/// extension twice gets it registered twice, and the codecs decide what that means.
/// Returns the number of extensions registered.
pub fn apply(provider: &dyn ProviderModule, json: &Codec, binary: &Codec) -> Result<usize, CodecError> {
    let extensions = provider.serialization_extensions();
    for extension in &extensions {
        json.register_extension(extension.as_ref())?;
        binary.register_extension(extension.as_ref())?;
        debug!(
            module = provider.name(),
            extension = extension.name(),
            "Registered serialization extension on shared codecs"
        );
    }
    Ok(extensions.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keystone_codec::{SerializationExtension, TypeRegistrations};
    use keystone_inject::{Binder, Module};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    struct PointExtension;

    impl SerializationExtension for PointExtension {
        fn name(&self) -> &str {
            "points"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register::<Point>("point");
        }
    }

    struct BlankExtension;

    impl SerializationExtension for BlankExtension {
        fn name(&self) -> &str {
            "blank"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register::<String>(" ");
        }
    }

    struct TestProvider(Vec<Arc<dyn SerializationExtension>>);

    impl Module for TestProvider {
        fn configure(&self, _binder: &mut Binder) {}
    }

    impl ProviderModule for TestProvider {
        fn serialization_extensions(&self) -> Vec<Arc<dyn SerializationExtension>> {
            self.0.clone()
        }
    }

    #[test]
    fn test_both_codecs_receive_every_extension() {
        let (json, binary) = (Codec::json(), Codec::binary());
        let extension: Arc<dyn SerializationExtension> = Arc::new(PointExtension);
        let provider = TestProvider(vec![extension.clone(), extension]);

        assert_eq!(apply(&provider, &json, &binary).unwrap(), 2);
        assert_eq!(json.registered_extensions(), vec!["points", "points"]);
        assert_eq!(json.registered_extensions(), binary.registered_extensions());

        let point = Point { x: 1, y: -2 };
        let bytes = binary.encode(&point).unwrap();
        assert_eq!(binary.decode::<Point>(&bytes).unwrap(), point);
        let text = json.encode(&point).unwrap();
        assert_eq!(json.decode::<Point>(&text).unwrap(), point);
    }

    #[test]
    fn test_no_extensions() {
        let (json, binary) = (Codec::json(), Codec::binary());
        assert_eq!(apply(&TestProvider(Vec::new()), &json, &binary).unwrap(), 0);
        assert!(json.registered_extensions().is_empty());
        assert!(binary.registered_extensions().is_empty());
    }

    #[test]
    fn test_rejected_extension_stops_registration() {
        let (json, binary) = (Codec::json(), Codec::binary());
        let provider = TestProvider(vec![Arc::new(BlankExtension), Arc::new(PointExtension)]);

        assert!(apply(&provider, &json, &binary).is_err());
        assert!(!json.is_registered::<Point>());
        assert!(!binary.is_registered::<Point>());
    }
}
