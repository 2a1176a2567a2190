use std::collections::HashSet;

use crate::context::{LoadingContext, TypeOrigin};
use crate::error::{ExtensionLoadError, Result};

/// A provider type found by service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderType {
    pub type_name: String,
    pub origin: TypeOrigin,
}

/// Service discovery: the provider types a loading context offers for a capability.
pub trait ServiceRegistry: Send + Sync {
    fn providers(&self, context: &dyn LoadingContext, capability: &str) -> Result<Vec<ProviderType>>;
}

/// Discovers providers from the service declarations of the context's own artifacts.
///
/// Declarations are returned in artifact order, each type name once. Every declared
/// type has to resolve through the context or one of its parents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptorServiceRegistry;

impl ServiceRegistry for DescriptorServiceRegistry {
    fn providers(&self, context: &dyn LoadingContext, capability: &str) -> Result<Vec<ProviderType>> {
        let mut seen = HashSet::new();
        let mut providers = Vec::new();

        for type_name in context.service_declarations(capability) {
            if !seen.insert(type_name.clone()) {
                continue;
            }
            let origin = context
                .resolve(&type_name)
                .ok_or_else(|| ExtensionLoadError::MissingType {
                    type_name: type_name.clone(),
                    context: context.name().to_string(),
                })?;
            providers.push(ProviderType { type_name, origin });
        }

        Ok(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostContext;

    /// In-memory context standing in for an extension.
    struct FakeContext {
        parent: HostContext,
        local: Vec<&'static str>,
        declared: Vec<&'static str>,
    }

    impl LoadingContext for FakeContext {
        fn name(&self) -> &str {
            "fake"
        }

        fn find_local(&self, type_name: &str) -> Option<TypeOrigin> {
            self.local
                .iter()
                .any(|local| *local == type_name)
                .then_some(TypeOrigin::Host)
        }

        fn parent(&self) -> Option<&dyn LoadingContext> {
            Some(&self.parent)
        }

        fn service_declarations(&self, _capability: &str) -> Vec<String> {
            self.declared.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_declarations_are_deduplicated_in_order() {
        let context = FakeContext {
            parent: HostContext::with_types(["host.Provider"]),
            local: vec!["ext.B", "ext.A"],
            declared: vec!["ext.B", "ext.A", "ext.B", "host.Provider"],
        };

        let providers = DescriptorServiceRegistry.providers(&context, "cap").unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.type_name.as_str()).collect();
        assert_eq!(names, vec!["ext.B", "ext.A", "host.Provider"]);
    }

    #[test]
    fn test_no_declarations_is_empty() {
        let context = FakeContext {
            parent: HostContext::new(),
            local: vec![],
            declared: vec![],
        };
        assert!(DescriptorServiceRegistry.providers(&context, "cap").unwrap().is_empty());
    }

    #[test]
    fn test_unresolvable_declaration() {
        let context = FakeContext {
            parent: HostContext::new(),
            local: vec![],
            declared: vec!["ext.Missing"],
        };
        match DescriptorServiceRegistry.providers(&context, "cap") {
            Err(ExtensionLoadError::MissingType { type_name, context }) => {
                assert_eq!(type_name, "ext.Missing");
                assert_eq!(context, "fake");
            }
            other => panic!("expected missing type, got {other:?}"),
        }
    }
}
