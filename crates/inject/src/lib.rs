//! Dependency-injection container used by the keystone bootstrap.
//!
//! Modules declare bindings through a [`Binder`]; an [`Injector`] is created from an
//! ordered set of modules and hands out shared instances by [`Key`]. Module types that
//! need services from an existing injector implement [`FromInjector`] and are described
//! by a [`ModuleClass`].

mod binder;
pub mod error;
mod injector;
mod key;
mod module;

pub use binder::Binder;
pub use error::{InjectError, Result};
pub use injector::Injector;
pub use key::Key;
pub use module::{FromInjector, Module, ModuleClass};
