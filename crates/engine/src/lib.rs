//! Isolated loading of resolved extensions.
//!
//! Each extension gets its own [`IsolatedContext`] built from its artifact set. Type
//! names are looked up in the extension's artifacts first and in the host's
//! [`HostContext`] otherwise. Host framework artifacts (see [`EXCLUSIONS`]) are dropped
//! before the context is built, so shared framework types always resolve to the host's
//! definition.
//!
//! Provider modules are discovered through a [`ServiceRegistry`]. An artifact that
//! carries code implements its providers itself: the code runs on WebAssembly, one
//! store per provider instance (see [`guest`]). Providers declared by artifacts
//! without code are created from the implementations linked into the host's
//! [`ProviderCatalog`].

mod catalog;
pub mod context;
pub mod error;
mod exclusion;
pub mod guest;
mod loader;
pub mod registry;

pub use catalog::ProviderCatalog;
pub use context::{HostContext, IsolatedContext, LoadingContext, TypeOrigin};
pub use error::{ExtensionLoadError, Result};
pub use exclusion::{EXCLUSIONS, excluded_by, is_excluded};
pub use guest::{GuestCode, GuestError, GuestManifest, GuestProvider, GuestRuntime, GuestService, GuestTypes};
pub use loader::IsolatedLoader;
pub use registry::{DescriptorServiceRegistry, ProviderType, ServiceRegistry};
