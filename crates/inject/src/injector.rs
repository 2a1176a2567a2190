use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use tracing::debug;

use crate::binder::{Binder, Binding, BindingEntry, Provided};
use crate::error::{InjectError, Result};
use crate::key::Key;
use crate::module::{FromInjector, Module};

/// An immutable set of bindings created from an ordered list of modules.
pub struct Injector {
    bindings: HashMap<Key, BindingEntry>,
    resolving: Mutex<HashMap<ThreadId, Vec<Key>>>,
}

impl Injector {
    /// Creates an injector from `modules`, configured in iteration order.
    pub fn create<'a, I>(modules: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a dyn Module>,
    {
        let mut binder = Binder::new();
        let mut count = 0usize;
        for module in modules {
            binder.enter(module.name());
            module.configure(&mut binder);
            count += 1;
        }
        let bindings = binder.finish()?;
        debug!(modules = count, bindings = bindings.len(), "Created injector");

        Ok(Self {
            bindings,
            resolving: Mutex::new(HashMap::new()),
        })
    }

    pub fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get(Key::of::<T>())
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, qualifier: &'static str) -> Result<Arc<T>> {
        self.get(Key::named::<T>(qualifier))
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: Key) -> Result<Arc<T>> {
        if key.type_id() != TypeId::of::<T>() {
            return Err(InjectError::TypeMismatch(key));
        }
        self.provide(key)?
            .downcast::<T>()
            .map_err(|_| InjectError::TypeMismatch(key))
    }

    pub fn has_binding(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.bindings.keys()
    }

    /// Builds a `T` from this injector. `T` must have been bound as constructible.
    pub fn construct<T: FromInjector + 'static>(&self) -> Result<T> {
        let key = Key::of::<T>();
        match self.bindings.get(&key) {
            Some(BindingEntry {
                binding: Binding::Constructible,
                ..
            }) => {
                let _guard = self.enter(key)?;
                T::from_injector(self)
            }
            _ => Err(InjectError::UnboundClass(key.type_name())),
        }
    }

    /// Populates the declared dependencies of an existing module instance.
    pub fn inject_members<M: Module + ?Sized>(&self, module: &mut M) -> Result<()> {
        module.inject_members(self)
    }

    fn provide(&self, key: Key) -> Result<Provided> {
        let entry = self.bindings.get(&key).ok_or(InjectError::Unbound(key))?;
        match &entry.binding {
            Binding::Instance(value) => Ok(value.clone()),
            Binding::Singleton { provider, cell } => {
                if let Some(value) = cell.get() {
                    return Ok(value.clone());
                }
                let _guard = self.enter(key)?;
                cell.get_or_try_init(|| provider(self)).cloned()
            }
            Binding::Unscoped(provider) => {
                let _guard = self.enter(key)?;
                provider(self)
            }
            Binding::Constructible => Err(InjectError::Unbound(key)),
        }
    }

    fn enter(&self, key: Key) -> Result<ResolvingGuard<'_>> {
        let thread = thread::current().id();
        let mut resolving = self.resolving.lock().unwrap_or_else(PoisonError::into_inner);
        let stack = resolving.entry(thread).or_default();
        if stack.contains(&key) {
            let path = stack
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| k.type_name())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(InjectError::CircularDependency { key, path });
        }
        stack.push(key);
        Ok(ResolvingGuard {
            injector: self,
            thread,
        })
    }
}

struct ResolvingGuard<'a> {
    injector: &'a Injector,
    thread: ThreadId,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        let mut resolving = self
            .injector
            .resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(stack) = resolving.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                resolving.remove(&self.thread);
            }
        }
    }
}
