use std::collections::HashMap;

use keystone_extension::{ProviderModule, ProviderRegistration};
use tracing::warn;

use crate::error::{ExtensionLoadError, Result};
use crate::registry::ProviderType;

/// Provider implementations linked into the host, keyed by declared type name.
///
/// Only consulted for providers whose artifact carries no code.
#[derive(Debug, Default, Clone)]
pub struct ProviderCatalog {
    registrations: HashMap<&'static str, ProviderRegistration>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration. A later registration for the same type name replaces the
    /// earlier one.
    pub fn register(&mut self, registration: ProviderRegistration) -> &mut Self {
        if self
            .registrations
            .insert(registration.type_name, registration)
            .is_some()
        {
            warn!(type_name = registration.type_name, "Replaced provider registration");
        }
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&ProviderRegistration> {
        self.registrations.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Creates a fresh instance of a discovered provider type.
    pub fn instantiate(&self, provider: &ProviderType) -> Result<Box<dyn ProviderModule>> {
        let registration = self.get(&provider.type_name).ok_or_else(|| {
            ExtensionLoadError::MissingImplementation {
                type_name: provider.type_name.clone(),
                origin: provider.origin.to_string(),
            }
        })?;
        Ok((registration.create)())
    }
}

impl Extend<ProviderRegistration> for ProviderCatalog {
    fn extend<T: IntoIterator<Item = ProviderRegistration>>(&mut self, iter: T) {
        for registration in iter {
            self.register(registration);
        }
    }
}

impl FromIterator<ProviderRegistration> for ProviderCatalog {
    fn from_iter<T: IntoIterator<Item = ProviderRegistration>>(iter: T) -> Self {
        let mut catalog = Self::new();
        catalog.extend(iter);
        catalog
    }
}
