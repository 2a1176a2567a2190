use std::sync::Arc;

use keystone_extension::{PROVIDER_CAPABILITY, ProviderModule};
use keystone_store::{Artifact, ArtifactSet};
use tracing::{debug, info};

use crate::catalog::ProviderCatalog;
use crate::context::{IsolatedContext, LoadingContext, TypeOrigin};
use crate::error::{ExtensionLoadError, Result};
use crate::exclusion::excluded_by;
use crate::guest::GuestRuntime;
use crate::registry::{DescriptorServiceRegistry, ProviderType, ServiceRegistry};

/// Loads extensions into isolated contexts and discovers their provider modules.
#[derive(Clone)]
pub struct IsolatedLoader {
    registry: Arc<dyn ServiceRegistry>,
    catalog: Arc<ProviderCatalog>,
    runtime: GuestRuntime,
}

impl IsolatedLoader {
    /// A loader whose providers come from artifact code, or from `catalog` for
    /// provider types the host implements itself.
    pub fn new(catalog: Arc<ProviderCatalog>) -> Result<Self> {
        Self::with_registry(Arc::new(DescriptorServiceRegistry), catalog)
    }

    pub fn with_registry(registry: Arc<dyn ServiceRegistry>, catalog: Arc<ProviderCatalog>) -> Result<Self> {
        let runtime = GuestRuntime::new().map_err(ExtensionLoadError::Runtime)?;
        Ok(Self {
            registry,
            catalog,
            runtime,
        })
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Drops host framework artifacts from `artifacts`.
    pub fn filter(&self, artifacts: ArtifactSet) -> Vec<Artifact> {
        artifacts
            .into_iter()
            .filter(|artifact| match excluded_by(artifact.group()) {
                Some(prefix) => {
                    debug!(artifact = %artifact.coordinate(), prefix, "Skipped artifact");
                    false
                }
                None => {
                    debug!(artifact = %artifact.coordinate(), file = %artifact.file().display(), "Added artifact");
                    true
                }
            })
            .collect()
    }

    /// Builds the isolated context for an artifact set, after exclusion filtering.
    pub fn context(&self, artifacts: ArtifactSet, host: Arc<dyn LoadingContext>) -> Result<IsolatedContext> {
        let name = artifacts.root().to_string();
        let kept = self.filter(artifacts);
        IsolatedContext::from_artifacts(name, &kept, host, &self.runtime)
    }

    /// Instantiates every provider module the context declares, in discovery order.
    pub fn discover(&self, context: &dyn LoadingContext) -> Result<Vec<Box<dyn ProviderModule>>> {
        let providers = self.registry.providers(context, PROVIDER_CAPABILITY)?;
        providers
            .iter()
            .map(|provider| {
                debug!(context = context.name(), provider = %provider.type_name, origin = %provider.origin, "Discovered provider");
                self.instantiate(context, provider)
            })
            .collect()
    }

    /// Runs the provider from its artifact's code when the artifact carries any.
    fn instantiate(&self, context: &dyn LoadingContext, provider: &ProviderType) -> Result<Box<dyn ProviderModule>> {
        let code = match &provider.origin {
            TypeOrigin::Artifact(coordinate) => context.guest_code(coordinate),
            TypeOrigin::Host => None,
        };
        match code {
            Some(code) => {
                let module = code
                    .instantiate(&provider.type_name)
                    .map_err(|source| ExtensionLoadError::Guest {
                        type_name: provider.type_name.clone(),
                        origin: provider.origin.to_string(),
                        source,
                    })?;
                Ok(Box::new(module))
            }
            None => self.catalog.instantiate(provider),
        }
    }

    /// Loads one resolved extension. The artifact set and its context are dropped once
    /// the providers have been created.
    pub fn load(&self, artifacts: ArtifactSet, host: Arc<dyn LoadingContext>) -> Result<Vec<Box<dyn ProviderModule>>> {
        let context = self.context(artifacts, host)?;
        let providers = self.discover(&context)?;
        info!(context = context.name(), providers = providers.len(), "Loaded extension");
        Ok(providers)
    }
}
