use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use keystone_codec::{Codec, SharedCodecs};
use keystone_extension::{ProviderModule, ProviderModuleClass};
use keystone_inject::{FromInjector, InjectError, Injector, Module, ModuleClass};
use tracing::debug;

use crate::error::CompositionError;
use crate::modules::{BINARY, JSON};
use crate::registrar;

/// Everything the composer accepts.
pub enum ModuleInput {
    ReadyProvider(Box<dyn ProviderModule>),
    ReadyModule(Box<dyn Module>),
    ProviderClass(ProviderModuleClass),
    ModuleClass(ModuleClass),
}

impl ModuleInput {
    pub fn provider<P: ProviderModule + 'static>(provider: P) -> Self {
        ModuleInput::ReadyProvider(Box::new(provider))
    }

    pub fn module<M: Module + 'static>(module: M) -> Self {
        ModuleInput::ReadyModule(Box::new(module))
    }

    pub fn provider_class<P: ProviderModule + FromInjector + 'static>() -> Self {
        ModuleInput::ProviderClass(ProviderModuleClass::of::<P>())
    }

    pub fn module_class<M: Module + FromInjector + 'static>() -> Self {
        ModuleInput::ModuleClass(ModuleClass::of::<M>())
    }

    /// Classifies a dynamically typed value.
    ///
    /// Accepts boxed provider modules, boxed modules, module classes and inputs that are
    /// already classified; anything else is rejected with the value's type name.
    pub fn from_value<T: Any>(value: T) -> Result<Self, CompositionError> {
        let value: Box<dyn Any> = Box::new(value);
        let value = match value.downcast::<ModuleInput>() {
            Ok(input) => return Ok(*input),
            Err(value) => value,
        };
        let value = match value.downcast::<Box<dyn ProviderModule>>() {
            Ok(provider) => return Ok(ModuleInput::ReadyProvider(*provider)),
            Err(value) => value,
        };
        let value = match value.downcast::<Box<dyn Module>>() {
            Ok(module) => return Ok(ModuleInput::ReadyModule(*module)),
            Err(value) => value,
        };
        let value = match value.downcast::<ProviderModuleClass>() {
            Ok(class) => return Ok(ModuleInput::ProviderClass(*class)),
            Err(value) => value,
        };
        match value.downcast::<ModuleClass>() {
            Ok(class) => Ok(ModuleInput::ModuleClass(*class)),
            Err(_) => Err(CompositionError::UnrecognizedInput {
                type_name: type_name::<T>(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModuleInput::ReadyProvider(provider) => provider.name(),
            ModuleInput::ReadyModule(module) => module.name(),
            ModuleInput::ProviderClass(class) => class.name(),
            ModuleInput::ModuleClass(class) => class.name(),
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(
            self,
            ModuleInput::ProviderClass(_) | ModuleInput::ModuleClass(_)
        )
    }

    pub(crate) fn class_key(&self) -> Option<keystone_inject::Key> {
        match self {
            ModuleInput::ProviderClass(class) => Some(class.key()),
            ModuleInput::ModuleClass(class) => Some(class.key()),
            _ => None,
        }
    }
}

impl fmt::Debug for ModuleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ModuleInput::ReadyProvider(_) => "ReadyProvider",
            ModuleInput::ReadyModule(_) => "ReadyModule",
            ModuleInput::ProviderClass(_) => "ProviderClass",
            ModuleInput::ModuleClass(_) => "ModuleClass",
        };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

/// Ordered, append-only list of the modules that make up the final container.
///
/// Instances get their members injected from the minimal container before they are
/// accepted, classes are instantiated from it. Provider modules have their
/// serialization extensions registered on the shared codecs first.
pub struct ModuleList {
    injector: Arc<Injector>,
    codecs: SharedCodecs,
    modules: Vec<Box<dyn Module>>,
}

impl ModuleList {
    /// Starts an empty list on top of a minimal container, taking the shared codecs
    /// from its [`JSON`] and [`BINARY`] bindings.
    pub fn new(injector: Arc<Injector>) -> Result<Self, CompositionError> {
        let codec = |qualifier: &'static str| {
            injector
                .get_named::<Codec>(qualifier)
                .map_err(|source| CompositionError::MissingCodec { qualifier, source })
        };
        let codecs = SharedCodecs::from_parts(codec(JSON)?, codec(BINARY)?);
        Ok(Self {
            injector,
            codecs,
            modules: Vec::new(),
        })
    }

    /// Prepares `input` and appends it. Nothing is appended when preparation fails.
    pub fn add_module(&mut self, input: ModuleInput) -> Result<&mut Self, CompositionError> {
        let name = input.name();
        let module: Box<dyn Module> = match input {
            ModuleInput::ReadyProvider(mut provider) => {
                self.injector
                    .inject_members(provider.as_mut())
                    .map_err(|source| CompositionError::Injection { module: name, source })?;
                self.register_codecs(provider.as_ref())?;
                provider as Box<dyn Module>
            }
            ModuleInput::ReadyModule(mut module) => {
                self.injector
                    .inject_members(module.as_mut())
                    .map_err(|source| CompositionError::Injection { module: name, source })?;
                module
            }
            ModuleInput::ProviderClass(class) => {
                let provider = class
                    .instantiate(&self.injector)
                    .map_err(|e| instantiation_error(name, e))?;
                self.register_codecs(provider.as_ref())?;
                provider as Box<dyn Module>
            }
            ModuleInput::ModuleClass(class) => class
                .instantiate(&self.injector)
                .map_err(|e| instantiation_error(name, e))?,
        };

        debug!(module = name, position = self.modules.len(), "Added module");
        self.modules.push(module);
        Ok(self)
    }

    /// Classifies `value` with [`ModuleInput::from_value`] and adds it.
    pub fn add_value<T: Any>(&mut self, value: T) -> Result<&mut Self, CompositionError> {
        self.add_module(ModuleInput::from_value(value)?)
    }

    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn into_modules(self) -> Vec<Box<dyn Module>> {
        self.modules
    }

    fn register_codecs(&self, provider: &dyn ProviderModule) -> Result<(), CompositionError> {
        registrar::apply(provider, self.codecs.json(), self.codecs.binary())
            .map(|_| ())
            .map_err(|source| CompositionError::Codec {
                module: provider.name(),
                source,
            })
    }
}

fn instantiation_error(module: &'static str, error: InjectError) -> CompositionError {
    match error {
        InjectError::UnboundClass(type_name) if type_name == module => {
            CompositionError::UnboundClass { type_name }
        }
        source => CompositionError::Injection { module, source },
    }
}

#[cfg(test)]
mod tests {
    use keystone_codec::{SerializationExtension, TypeRegistrations};
    use keystone_inject::Binder;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::modules::CodecModule;

    #[derive(Debug, Clone, PartialEq)]
    struct Label(String);

    struct LabelModule;

    impl Module for LabelModule {
        fn configure(&self, binder: &mut Binder) {
            binder.bind_instance(Label("minimal".to_string()));
        }
    }

    /// Copies the minimal container's label when its members are injected.
    #[derive(Default)]
    struct EchoModule {
        label: Option<Label>,
    }

    impl Module for EchoModule {
        fn configure(&self, binder: &mut Binder) {
            if let Some(label) = &self.label {
                binder.bind_named_instance("echo", label.clone());
            }
        }

        fn inject_members(&mut self, injector: &Injector) -> keystone_inject::Result<()> {
            self.label = Some(injector.get_instance::<Label>()?.as_ref().clone());
            Ok(())
        }
    }

    struct NeedsMissing;

    impl Module for NeedsMissing {
        fn configure(&self, _binder: &mut Binder) {}

        fn inject_members(&mut self, injector: &Injector) -> keystone_inject::Result<()> {
            injector.get_instance::<u64>().map(|_| ())
        }
    }

    struct ClassModule {
        label: Arc<Label>,
    }

    impl FromInjector for ClassModule {
        fn from_injector(injector: &Injector) -> keystone_inject::Result<Self> {
            Ok(Self {
                label: injector.get_instance()?,
            })
        }
    }

    impl Module for ClassModule {
        fn configure(&self, binder: &mut Binder) {
            binder.bind_named_instance("class", self.label.as_ref().clone());
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u32,
    }

    struct WidgetExtension;

    impl SerializationExtension for WidgetExtension {
        fn name(&self) -> &str {
            "widgets"
        }

        fn setup(&self, types: &mut TypeRegistrations) {
            types.register::<Widget>("widget");
        }
    }

    struct WidgetProvider;

    impl FromInjector for WidgetProvider {
        fn from_injector(_injector: &Injector) -> keystone_inject::Result<Self> {
            Ok(Self)
        }
    }

    impl Module for WidgetProvider {
        fn configure(&self, _binder: &mut Binder) {}
    }

    impl ProviderModule for WidgetProvider {
        fn serialization_extensions(&self) -> Vec<Arc<dyn SerializationExtension>> {
            vec![Arc::new(WidgetExtension)]
        }
    }

    struct ClassBinder;

    impl Module for ClassBinder {
        fn configure(&self, binder: &mut Binder) {
            binder.bind_constructible::<ClassModule>();
            binder.bind_constructible::<WidgetProvider>();
        }
    }

    fn list() -> (ModuleList, SharedCodecs) {
        let codecs = SharedCodecs::new();
        let injector = Injector::create([
            &LabelModule as &dyn Module,
            &ClassBinder,
            &CodecModule::new(codecs.clone()),
        ])
        .unwrap();
        (ModuleList::new(Arc::new(injector)).unwrap(), codecs)
    }

    #[test]
    fn test_codecs_come_from_the_container() {
        let (mut list, codecs) = list();
        let unrelated = SharedCodecs::new();
        list.add_module(ModuleInput::provider(WidgetProvider)).unwrap();

        assert_eq!(codecs.json().registered_extensions(), vec!["widgets"]);
        assert_eq!(codecs.binary().registered_extensions(), vec!["widgets"]);
        assert!(unrelated.json().registered_extensions().is_empty());
    }

    #[test]
    fn test_container_without_codecs() {
        let injector = Injector::create([&LabelModule as &dyn Module]).unwrap();
        match ModuleList::new(Arc::new(injector)) {
            Err(CompositionError::MissingCodec { qualifier, .. }) => assert_eq!(qualifier, JSON),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("list created without codecs"),
        }
    }

    #[test]
    fn test_modules_are_kept_in_order() {
        let (mut list, _) = list();
        list.add_module(ModuleInput::module(LabelModule))
            .unwrap()
            .add_module(ModuleInput::module_class::<ClassModule>())
            .unwrap()
            .add_module(ModuleInput::provider(WidgetProvider))
            .unwrap();

        let names: Vec<_> = list.modules().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec![
                type_name::<LabelModule>(),
                type_name::<ClassModule>(),
                type_name::<WidgetProvider>()
            ]
        );
    }

    #[test]
    fn test_instances_get_members_injected() {
        let (mut list, _) = list();
        list.add_module(ModuleInput::module(EchoModule::default())).unwrap();
        assert_eq!(list.len(), 1);

        let injector = Injector::create(list.modules().iter().map(|m| &**m)).unwrap();
        assert_eq!(
            *injector.get_named::<Label>("echo").unwrap(),
            Label("minimal".to_string())
        );

        let result = list.add_module(ModuleInput::module(NeedsMissing));
        assert!(matches!(result, Err(CompositionError::Injection { .. })));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_providers_register_codecs() {
        let (mut list, codecs) = list();
        list.add_module(ModuleInput::provider_class::<WidgetProvider>()).unwrap();

        let widget = Widget { id: 7 };
        for codec in [codecs.json(), codecs.binary()] {
            let bytes = codec.encode(&widget).unwrap();
            assert_eq!(codec.decode::<Widget>(&bytes).unwrap(), widget);
        }
        assert_eq!(
            codecs.json().registered_extensions(),
            codecs.binary().registered_extensions()
        );
    }

    #[test]
    fn test_unbound_class() {
        let (mut list, _) = list();
        let result = list.add_module(ModuleInput::module_class::<UnboundModule>());
        assert!(matches!(
            result,
            Err(CompositionError::UnboundClass { .. })
        ));
        assert!(list.is_empty());
    }

    struct UnboundModule;

    impl FromInjector for UnboundModule {
        fn from_injector(_injector: &Injector) -> keystone_inject::Result<Self> {
            Ok(Self)
        }
    }

    impl Module for UnboundModule {
        fn configure(&self, _binder: &mut Binder) {}
    }

    #[test]
    fn test_unrecognized_value_leaves_list_untouched() {
        let (mut list, codecs) = list();
        list.add_value(ModuleClass::of::<ClassModule>()).unwrap();

        let result = list.add_value(42u32);
        match result {
            Err(CompositionError::UnrecognizedInput { type_name }) => assert_eq!(type_name, "u32"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("u32 accepted as a module"),
        }
        assert_eq!(list.len(), 1);
        assert!(codecs.json().registered_extensions().is_empty());
    }

    #[test]
    fn test_from_value_classifies_boxed_modules() {
        let provider: Box<dyn ProviderModule> = Box::new(WidgetProvider);
        assert!(matches!(
            ModuleInput::from_value(provider),
            Ok(ModuleInput::ReadyProvider(_))
        ));

        let module: Box<dyn Module> = Box::new(LabelModule);
        assert!(matches!(
            ModuleInput::from_value(module),
            Ok(ModuleInput::ReadyModule(_))
        ));

        let class = ProviderModuleClass::of::<WidgetProvider>();
        let input = ModuleInput::from_value(class).unwrap();
        assert!(input.is_class());
        assert_eq!(input.name(), type_name::<WidgetProvider>());

        assert!(matches!(
            ModuleInput::from_value(LabelModule),
            Err(CompositionError::UnrecognizedInput { .. })
        ));
    }
}
