//! Integration contract between keystone hosts and extension packages.
//!
//! An extension contributes one or more [`ProviderModule`]s. Each is a regular
//! injection [`Module`] that can additionally hand serialization extensions to the
//! host's shared codecs.

pub mod prelude;
mod register;

use std::fmt;
use std::sync::Arc;

use keystone_codec::SerializationExtension;
use keystone_inject::{FromInjector, Injector, Key, Module};

pub use register::ProviderRegistration;

/// Service capability under which extension packages declare their provider modules.
pub const PROVIDER_CAPABILITY: &str = "keystone.extension.ProviderModule";

/// A module supplied by an extension package.
pub trait ProviderModule: Module {
    /// Serialization extensions to register on both shared codecs.
    fn serialization_extensions(&self) -> Vec<Arc<dyn SerializationExtension>>;
}

/// A provider module type, instantiated from an injector.
#[derive(Clone, Copy)]
pub struct ProviderModuleClass {
    key: Key,
    construct: fn(&Injector) -> keystone_inject::Result<Box<dyn ProviderModule>>,
}

impl ProviderModuleClass {
    pub fn of<P: ProviderModule + FromInjector + 'static>() -> Self {
        Self {
            key: Key::of::<P>(),
            construct: construct_provider::<P>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.key.type_name()
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn bind(&self, binder: &mut keystone_inject::Binder) {
        binder.bind_constructible_key(self.key);
    }

    pub fn instantiate(&self, injector: &Injector) -> keystone_inject::Result<Box<dyn ProviderModule>> {
        (self.construct)(injector)
    }
}

impl fmt::Debug for ProviderModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderModuleClass")
            .field(&self.name())
            .finish()
    }
}

fn construct_provider<P: ProviderModule + FromInjector + 'static>(
    injector: &Injector,
) -> keystone_inject::Result<Box<dyn ProviderModule>> {
    Ok(Box::new(injector.construct::<P>()?))
}
