//! Modules the bootstrap installs on its own.

use std::sync::Arc;

use keystone_codec::{Codec, SharedCodecs};
use keystone_inject::{Binder, FromInjector, InjectError, Injector, Key, Module};
use uuid::Uuid;

use crate::config::{EXTENSIONS_PREFIX, ExtensionsConfig, JsonConfigurator, RuntimeProperties};

/// Qualifier of the shared JSON codec binding.
pub const JSON: &str = "json";
/// Qualifier of the shared binary codec binding.
pub const BINARY: &str = "binary";

/// Identifies one bootstrap run in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapRun {
    pub id: Uuid,
}

impl BootstrapRun {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for BootstrapRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Framework glue of the minimal container.
pub struct StartupModule {
    run: BootstrapRun,
}

impl StartupModule {
    pub fn new(run: BootstrapRun) -> Self {
        Self { run }
    }
}

impl Module for StartupModule {
    fn name(&self) -> &'static str {
        "StartupModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_instance(self.run);
    }
}

/// Provides the shared codecs, both as a pair and individually by qualifier.
pub struct CodecModule {
    codecs: SharedCodecs,
}

impl CodecModule {
    pub fn new(codecs: SharedCodecs) -> Self {
        Self { codecs }
    }
}

impl Module for CodecModule {
    fn name(&self) -> &'static str {
        "CodecModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_shared(Some(JSON), self.codecs.json().clone());
        binder.bind_shared(Some(BINARY), self.codecs.binary().clone());
        binder.bind_instance(self.codecs.clone());
    }
}

pub struct PropertiesModule {
    properties: Arc<RuntimeProperties>,
}

impl PropertiesModule {
    pub fn new(properties: Arc<RuntimeProperties>) -> Self {
        Self { properties }
    }
}

impl Module for PropertiesModule {
    fn name(&self) -> &'static str {
        "PropertiesModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_shared(None, self.properties.clone());
    }
}

pub struct ConfigModule;

impl Module for ConfigModule {
    fn name(&self) -> &'static str {
        "ConfigModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_singleton(|injector| {
            Ok(JsonConfigurator::new(injector.get_instance::<RuntimeProperties>()?))
        });
    }
}

/// Makes the caller's module classes constructible and binds [`ExtensionsConfig`].
pub(crate) struct BootstrapModule {
    classes: Vec<Key>,
}

impl BootstrapModule {
    pub(crate) fn new(classes: Vec<Key>) -> Self {
        Self { classes }
    }
}

impl Module for BootstrapModule {
    fn name(&self) -> &'static str {
        "BootstrapModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_constructible::<SecondaryModule>();
        for class in &self.classes {
            binder.bind_constructible_key(*class);
        }

        binder.bind_singleton(|injector| {
            injector
                .get_instance::<JsonConfigurator>()?
                .configurate::<ExtensionsConfig>(EXTENSIONS_PREFIX)
                .map_err(|e| InjectError::Provision {
                    key: Key::of::<ExtensionsConfig>(),
                    message: e.to_string(),
                })
        });
    }
}

/// First module of the final container. Carries the bootstrap-level services of the
/// minimal container over, so both containers share the same instances.
pub struct SecondaryModule {
    run: Arc<BootstrapRun>,
    properties: Arc<RuntimeProperties>,
    configurator: Arc<JsonConfigurator>,
    extensions: Arc<ExtensionsConfig>,
    codecs: Arc<SharedCodecs>,
    json: Arc<Codec>,
    binary: Arc<Codec>,
}

impl FromInjector for SecondaryModule {
    fn from_injector(injector: &Injector) -> keystone_inject::Result<Self> {
        Ok(Self {
            run: injector.get_instance()?,
            properties: injector.get_instance()?,
            configurator: injector.get_instance()?,
            extensions: injector.get_instance()?,
            codecs: injector.get_instance()?,
            json: injector.get_named(JSON)?,
            binary: injector.get_named(BINARY)?,
        })
    }
}

impl Module for SecondaryModule {
    fn name(&self) -> &'static str {
        "SecondaryModule"
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_shared(None, self.run.clone());
        binder.bind_shared(None, self.properties.clone());
        binder.bind_shared(None, self.configurator.clone());
        binder.bind_shared(None, self.extensions.clone());
        binder.bind_shared(None, self.codecs.clone());
        binder.bind_shared(Some(JSON), self.json.clone());
        binder.bind_shared(Some(BINARY), self.binary.clone());
    }
}
