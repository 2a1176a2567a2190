use std::fmt;

use crate::ProviderModule;

/// Links a declared provider type name to the code that creates it.
///
/// Extension packages declare provider type names in their descriptors; the host
/// links the matching implementations through registrations like this one.
#[derive(Clone, Copy)]
pub struct ProviderRegistration {
    pub type_name: &'static str,
    pub create: fn() -> Box<dyn ProviderModule>,
}

impl fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Generates `provider_registrations()` for the listed provider types.
///
/// Each type must implement [`ProviderModule`] and [`Default`].
///
/// ```ignore
/// keystone_extension::provider_registrations! {
///     "org.example.ext.ExampleModule" => ExampleModule,
/// }
/// ```
#[macro_export]
macro_rules! provider_registrations {
    ($($type_name:literal => $provider:ty),* $(,)?) => {
        pub fn provider_registrations() -> ::std::vec::Vec<$crate::ProviderRegistration> {
            ::std::vec![
                $(
                    $crate::ProviderRegistration {
                        type_name: $type_name,
                        create: || -> ::std::boxed::Box<dyn $crate::ProviderModule> {
                            ::std::boxed::Box::new(<$provider as ::std::default::Default>::default())
                        },
                    },
                )*
            ]
        }
    };
}
