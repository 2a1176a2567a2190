use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{InjectError, Result};
use crate::injector::Injector;
use crate::key::Key;
use crate::module::FromInjector;

pub(crate) type Provided = Arc<dyn Any + Send + Sync>;
pub(crate) type ProviderFn = Arc<dyn Fn(&Injector) -> Result<Provided> + Send + Sync>;

pub(crate) enum Binding {
    Instance(Provided),
    Singleton {
        provider: ProviderFn,
        cell: OnceCell<Provided>,
    },
    Unscoped(ProviderFn),
    /// The type may be built through [`Injector::construct`].
    Constructible,
}

pub(crate) struct BindingEntry {
    pub(crate) binding: Binding,
    pub(crate) source: &'static str,
}

/// Collects the bindings declared by modules while an injector is being created.
pub struct Binder {
    module: &'static str,
    bindings: HashMap<Key, BindingEntry>,
    errors: Vec<InjectError>,
}

impl Binder {
    pub(crate) fn new() -> Self {
        Self {
            module: "<root>",
            bindings: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, module: &'static str) {
        self.module = module;
    }

    pub(crate) fn finish(self) -> Result<HashMap<Key, BindingEntry>> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.bindings),
        }
    }

    /// Name of the module currently declaring bindings.
    pub fn current_module(&self) -> &'static str {
        self.module
    }

    pub fn bind_instance<T: Send + Sync + 'static>(&mut self, value: T) {
        self.bind_shared(None, Arc::new(value));
    }

    pub fn bind_named_instance<T: Send + Sync + 'static>(&mut self, qualifier: &'static str, value: T) {
        self.bind_shared(Some(qualifier), Arc::new(value));
    }

    /// Binds an already shared value, so the injector hands out the same allocation.
    pub fn bind_shared<T: Send + Sync + 'static>(
        &mut self,
        qualifier: Option<&'static str>,
        value: Arc<T>,
    ) {
        let key = key_for::<T>(qualifier);
        self.insert(key, Binding::Instance(value));
    }

    /// Binds a provider evaluated once, on first request.
    pub fn bind_singleton<T, F>(&mut self, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_singleton_inner(None, provider);
    }

    pub fn bind_named_singleton<T, F>(&mut self, qualifier: &'static str, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_singleton_inner(Some(qualifier), provider);
    }

    /// Binds a provider evaluated on every request.
    pub fn bind_provider<T, F>(&mut self, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T> + Send + Sync + 'static,
    {
        let provider: ProviderFn =
            Arc::new(move |injector| Ok(Arc::new(provider(injector)?) as Provided));
        self.insert(Key::of::<T>(), Binding::Unscoped(provider));
    }

    pub fn bind_constructible<T: FromInjector + 'static>(&mut self) {
        self.bind_constructible_key(Key::of::<T>());
    }

    pub fn bind_constructible_key(&mut self, key: Key) {
        if let Some(existing) = self.bindings.get(&key) {
            // Declaring the same type constructible twice is harmless.
            if matches!(existing.binding, Binding::Constructible) {
                return;
            }
        }
        self.insert(key, Binding::Constructible);
    }

    /// Records a configuration problem; injector creation fails with the first one.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(InjectError::Configuration {
            module: self.module,
            message: message.into(),
        });
    }

    fn bind_singleton_inner<T, F>(&mut self, qualifier: Option<&'static str>, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T> + Send + Sync + 'static,
    {
        let provider: ProviderFn =
            Arc::new(move |injector| Ok(Arc::new(provider(injector)?) as Provided));
        self.insert(
            key_for::<T>(qualifier),
            Binding::Singleton {
                provider,
                cell: OnceCell::new(),
            },
        );
    }

    fn insert(&mut self, key: Key, binding: Binding) {
        if let Some(existing) = self.bindings.get(&key) {
            self.errors.push(InjectError::DuplicateBinding {
                key,
                first: existing.source,
                second: self.module,
            });
            return;
        }
        self.bindings.insert(
            key,
            BindingEntry {
                binding,
                source: self.module,
            },
        );
    }
}

fn key_for<T: 'static>(qualifier: Option<&'static str>) -> Key {
    match qualifier {
        Some(qualifier) => Key::named::<T>(qualifier),
        None => Key::of::<T>(),
    }
}
