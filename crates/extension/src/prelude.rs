pub use crate::provider_registrations;
pub use crate::{ProviderModule, ProviderModuleClass, ProviderRegistration};
pub use keystone_codec::{SerializationExtension, TypeRegistrations};
pub use keystone_inject::{Binder, FromInjector, Injector, Module};
