use std::fmt;

use crate::binder::Binder;
use crate::error::Result;
use crate::injector::Injector;
use crate::key::Key;

/// A unit of wiring that contributes bindings to an injector.
pub trait Module: Send + Sync {
    /// Human readable name used in logs and error messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Declares the bindings this module contributes.
    fn configure(&self, binder: &mut Binder);

    /// Populates dependencies the module itself declares, using an existing injector.
    ///
    /// Called on ready-made module instances before they are handed to a new injector.
    fn inject_members(&mut self, _injector: &Injector) -> Result<()> {
        Ok(())
    }
}

/// Types that can be built from an injector's bindings.
pub trait FromInjector: Sized {
    fn from_injector(injector: &Injector) -> Result<Self>;
}

/// A module type, as opposed to a module instance.
///
/// The type has to be bound as constructible (see [`ModuleClass::bind`]) in the
/// injector that later instantiates it.
#[derive(Clone, Copy)]
pub struct ModuleClass {
    key: Key,
    construct: fn(&Injector) -> Result<Box<dyn Module>>,
}

impl ModuleClass {
    pub fn of<M: Module + FromInjector + 'static>() -> Self {
        Self {
            key: Key::of::<M>(),
            construct: construct_module::<M>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.key.type_name()
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Makes the module type constructible from the injector being configured.
    pub fn bind(&self, binder: &mut Binder) {
        binder.bind_constructible_key(self.key);
    }

    pub fn instantiate(&self, injector: &Injector) -> Result<Box<dyn Module>> {
        (self.construct)(injector)
    }
}

impl fmt::Debug for ModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleClass").field(&self.name()).finish()
    }
}

fn construct_module<M: Module + FromInjector + 'static>(
    injector: &Injector,
) -> Result<Box<dyn Module>> {
    Ok(Box::new(injector.construct::<M>()?))
}
