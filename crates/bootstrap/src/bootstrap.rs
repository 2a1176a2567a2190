use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use keystone_codec::SharedCodecs;
use keystone_engine::{HostContext, IsolatedLoader, LoadingContext, ProviderCatalog};
use keystone_inject::{Injector, Module};
use keystone_store::{ArtifactResolver, Coordinate, DiagnosticSink, RepositoryResolver, ResolutionError};
use tracing::{Level, debug, info, warn};

use crate::composer::{ModuleInput, ModuleList};
use crate::config::{ExtensionsConfig, RuntimeProperties};
use crate::error::BootstrapError;
use crate::modules::{BootstrapModule, BootstrapRun, CodecModule, ConfigModule, PropertiesModule, SecondaryModule, StartupModule};

const RESOLVER_DIAGNOSTICS: &str = "keystone_store::diagnostics";

/// Creates the artifact resolver once the extensions configuration is known.
pub trait ResolverFactory: Send + Sync {
    fn create(
        &self,
        config: &ExtensionsConfig,
        sink: DiagnosticSink,
    ) -> Result<Box<dyn ArtifactResolver>, ResolutionError>;
}

/// Resolves from the configured local and remote repositories.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositoryResolverFactory;

impl ResolverFactory for RepositoryResolverFactory {
    fn create(
        &self,
        config: &ExtensionsConfig,
        sink: DiagnosticSink,
    ) -> Result<Box<dyn ArtifactResolver>, ResolutionError> {
        Ok(Box::new(RepositoryResolver::new(
            &config.local_repository,
            &config.remote_repositories,
            sink,
        )?))
    }
}

/// Collaborators of a bootstrap run.
pub struct BootstrapOptions {
    /// Properties file; [`PROPERTIES_FILE`](crate::config::PROPERTIES_FILE) when unset.
    pub properties_file: Option<PathBuf>,
    /// Already loaded properties. Takes precedence over `properties_file`.
    pub properties: Option<RuntimeProperties>,
    pub host: Arc<dyn LoadingContext>,
    pub catalog: Arc<ProviderCatalog>,
    pub resolver_factory: Arc<dyn ResolverFactory>,
    pub codecs: SharedCodecs,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            properties_file: None,
            properties: None,
            host: Arc::new(HostContext::new()),
            catalog: Arc::new(ProviderCatalog::new()),
            resolver_factory: Arc::new(RepositoryResolverFactory),
            codecs: SharedCodecs::global(),
        }
    }
}

impl BootstrapOptions {
    pub fn with_properties_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.properties_file = Some(path.into());
        self
    }

    pub fn with_properties(mut self, properties: RuntimeProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn LoadingContext>) -> Self {
        self.host = host;
        self
    }

    pub fn with_catalog(mut self, catalog: ProviderCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_resolver_factory(mut self, factory: Arc<dyn ResolverFactory>) -> Self {
        self.resolver_factory = factory;
        self
    }

    pub fn with_codecs(mut self, codecs: SharedCodecs) -> Self {
        self.codecs = codecs;
        self
    }
}

/// The minimal container is built; extensions have not been looked at yet.
pub struct MinimalReady {
    injector: Arc<Injector>,
    inputs: Vec<ModuleInput>,
}

/// The final container is built from the composed module list.
pub struct Composed {
    injector: Injector,
    modules: Vec<ComposedModule>,
}

/// Where a module of the final container came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    Framework,
    Caller,
    Extension(Coordinate),
}

impl fmt::Display for ModuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOrigin::Framework => write!(f, "framework"),
            ModuleOrigin::Caller => write!(f, "caller"),
            ModuleOrigin::Extension(coordinate) => write!(f, "extension[{coordinate}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedModule {
    pub name: &'static str,
    pub origin: ModuleOrigin,
}

/// Two-phase container construction.
///
/// [`Bootstrap::new`] builds the minimal container, which reads the extensions
/// configuration. [`Bootstrap::compose`] resolves and loads every configured extension
/// and builds the final container. A failed `compose` consumes the bootstrap; the
/// minimal container is never reused.
pub struct Bootstrap<S> {
    run: BootstrapRun,
    options: BootstrapOptions,
    state: S,
}

impl Bootstrap<MinimalReady> {
    pub fn new(options: BootstrapOptions, inputs: Vec<ModuleInput>) -> Result<Self, BootstrapError> {
        let run = BootstrapRun::new();
        let properties = match &options.properties {
            Some(properties) => properties.clone(),
            None => RuntimeProperties::load(options.properties_file.as_deref())?,
        };
        let classes = inputs.iter().filter_map(ModuleInput::class_key).collect();

        let modules: [Box<dyn Module>; 5] = [
            Box::new(StartupModule::new(run)),
            Box::new(CodecModule::new(options.codecs.clone())),
            Box::new(PropertiesModule::new(Arc::new(properties))),
            Box::new(ConfigModule),
            Box::new(BootstrapModule::new(classes)),
        ];
        let injector = Injector::create(modules.iter().map(|m| &**m)).map_err(|source| {
            BootstrapError::Container {
                phase: "minimal",
                source,
            }
        })?;
        debug!(run = %run.id, "Created minimal container");

        Ok(Self {
            run,
            options,
            state: MinimalReady {
                injector: Arc::new(injector),
                inputs,
            },
        })
    }

    pub fn injector(&self) -> &Injector {
        &self.state.injector
    }

    pub fn extensions_config(&self) -> Result<Arc<ExtensionsConfig>, BootstrapError> {
        self.state
            .injector
            .get_instance::<ExtensionsConfig>()
            .map_err(|source| BootstrapError::Container {
                phase: "minimal",
                source,
            })
    }

    /// Composes the module list and builds the final container.
    pub fn compose(self) -> Result<Bootstrap<Composed>, BootstrapError> {
        let config = self.extensions_config()?;
        let Bootstrap {
            run,
            options,
            state: MinimalReady { injector, inputs },
        } = self;

        let mut list = ModuleList::new(injector)?;
        let mut composed = Vec::new();

        list.add_module(ModuleInput::module_class::<SecondaryModule>())?;
        composed.push(last_module(&list, ModuleOrigin::Framework));
        for input in inputs {
            list.add_module(input)?;
            composed.push(last_module(&list, ModuleOrigin::Caller));
        }

        if !config.coordinates.is_empty() {
            let resolver = options
                .resolver_factory
                .create(&config, diagnostic_sink())
                .map_err(|source| BootstrapError::Resolution {
                    coordinate: config.coordinates.join(", "),
                    source,
                })?;
            let loader = IsolatedLoader::new(options.catalog.clone()).map_err(|source| {
                BootstrapError::ExtensionLoad {
                    coordinate: config.coordinates.join(", "),
                    source,
                }
            })?;
            let mut seen = HashSet::new();

            for raw in &config.coordinates {
                let resolution_error = |source| BootstrapError::Resolution {
                    coordinate: raw.clone(),
                    source,
                };
                let coordinate = Coordinate::parse(raw).map_err(resolution_error)?;
                if !seen.insert(coordinate.clone()) {
                    warn!(coordinate = %coordinate, "Skipped duplicate extension coordinate");
                    continue;
                }

                info!(coordinate = %coordinate, "Loading extension");
                let artifacts = resolver.resolve(&coordinate).map_err(resolution_error)?;
                let providers = loader
                    .load(artifacts, options.host.clone())
                    .map_err(|source| BootstrapError::ExtensionLoad {
                        coordinate: raw.clone(),
                        source,
                    })?;

                for provider in providers {
                    info!(coordinate = %coordinate, module = provider.name(), "Adding extension module");
                    list.add_module(ModuleInput::ReadyProvider(provider))
                        .map_err(|source| BootstrapError::ExtensionModule {
                            coordinate: raw.clone(),
                            source,
                        })?;
                    composed.push(last_module(&list, ModuleOrigin::Extension(coordinate.clone())));
                }
            }
        }

        let injector = Injector::create(list.modules().iter().map(|m| &**m)).map_err(|source| {
            BootstrapError::Container {
                phase: "final",
                source,
            }
        })?;
        info!(run = %run.id, modules = composed.len(), "Composed final container");

        Ok(Bootstrap {
            run,
            options,
            state: Composed {
                injector,
                modules: composed,
            },
        })
    }
}

impl Bootstrap<Composed> {
    pub fn injector(&self) -> &Injector {
        &self.state.injector
    }

    /// Modules of the final container, in the order they were added.
    pub fn modules(&self) -> &[ComposedModule] {
        &self.state.modules
    }

    pub fn into_injector(self) -> Injector {
        self.state.injector
    }
}

impl<S> Bootstrap<S> {
    pub fn run(&self) -> BootstrapRun {
        self.run
    }

    pub fn codecs(&self) -> &SharedCodecs {
        &self.options.codecs
    }
}

/// Runs both phases and returns the final container.
pub fn make_injector(options: BootstrapOptions, inputs: Vec<ModuleInput>) -> Result<Injector, BootstrapError> {
    Ok(Bootstrap::new(options, inputs)?.compose()?.into_injector())
}

fn last_module(list: &ModuleList, origin: ModuleOrigin) -> ComposedModule {
    ComposedModule {
        name: list.modules().last().map_or("<none>", |module| module.name()),
        origin,
    }
}

/// Resolver chatter is only worth collecting when someone is going to read it.
fn diagnostic_sink() -> DiagnosticSink {
    if tracing::enabled!(target: RESOLVER_DIAGNOSTICS, Level::DEBUG) {
        DiagnosticSink::Tracing
    } else {
        DiagnosticSink::Discard
    }
}
