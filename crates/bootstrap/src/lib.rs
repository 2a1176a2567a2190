//! Extension-aware composition of the final injection container.
//!
//! A bootstrap run has two phases. The minimal container holds just enough to read
//! runtime properties and the [`ExtensionsConfig`]. Then every configured extension
//! coordinate is resolved into an artifact set, loaded into an isolated context and
//! its provider modules are appended to the [`ModuleList`] after their serialization
//! extensions were registered on the shared codecs. The final container is built from
//! the complete list.
//!
//! ```rust,no_run
//! use keystone_bootstrap::{BootstrapOptions, make_injector};
//!
//! # fn main() -> Result<(), keystone_bootstrap::BootstrapError> {
//! let injector = make_injector(BootstrapOptions::default(), Vec::new())?;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
pub mod composer;
pub mod config;
pub mod error;
pub mod modules;
pub mod registrar;

pub use bootstrap::{
    Bootstrap, BootstrapOptions, Composed, ComposedModule, MinimalReady, ModuleOrigin,
    RepositoryResolverFactory, ResolverFactory, make_injector,
};
pub use composer::{ModuleInput, ModuleList};
pub use config::{ExtensionsConfig, JsonConfigurator, RuntimeProperties};
pub use error::{BootstrapError, CompositionError, ConfigError};
