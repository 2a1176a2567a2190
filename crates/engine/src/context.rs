use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use keystone_store::{Artifact, ArtifactDescriptor, Coordinate};
use tracing::{debug, trace};

use crate::error::{ExtensionLoadError, Result};
use crate::guest::{GuestCode, GuestRuntime};

/// Where a resolved type is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeOrigin {
    Host,
    Artifact(Coordinate),
}

impl fmt::Display for TypeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeOrigin::Host => write!(f, "host"),
            TypeOrigin::Artifact(coordinate) => write!(f, "artifact[{coordinate}]"),
        }
    }
}

/// A scope that resolves type names, delegating to a parent for anything it does not
/// define itself.
pub trait LoadingContext: Send + Sync {
    fn name(&self) -> &str;

    /// Looks `type_name` up in this context only.
    fn find_local(&self, type_name: &str) -> Option<TypeOrigin>;

    fn parent(&self) -> Option<&dyn LoadingContext>;

    /// Looks `type_name` up locally first, then in the parent chain.
    fn resolve(&self, type_name: &str) -> Option<TypeOrigin> {
        self.find_local(type_name)
            .or_else(|| self.parent().and_then(|parent| parent.resolve(type_name)))
    }

    /// Provider type names declared for `capability` by this context's own artifacts.
    ///
    /// Declarations of the parent chain are not included, so host-declared providers
    /// are never rediscovered through an extension.
    fn service_declarations(&self, capability: &str) -> Vec<String>;

    /// Compiled code of the artifact at `coordinate`, looked up locally first.
    fn guest_code(&self, coordinate: &Coordinate) -> Option<&GuestCode> {
        self.parent().and_then(|parent| parent.guest_code(coordinate))
    }
}

/// The host application's own context, at the root of every delegation chain.
#[derive(Debug, Default, Clone)]
pub struct HostContext {
    types: BTreeSet<String>,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn define(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.types.insert(type_name.into());
        self
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}

impl LoadingContext for HostContext {
    fn name(&self) -> &str {
        "host"
    }

    fn find_local(&self, type_name: &str) -> Option<TypeOrigin> {
        self.types.contains(type_name).then_some(TypeOrigin::Host)
    }

    fn parent(&self) -> Option<&dyn LoadingContext> {
        None
    }

    fn service_declarations(&self, _capability: &str) -> Vec<String> {
        Vec::new()
    }
}

/// The loading context of one extension, built from its (already filtered) artifacts.
pub struct IsolatedContext {
    name: String,
    parent: Arc<dyn LoadingContext>,
    types: HashMap<String, Coordinate>,
    code: HashMap<Coordinate, GuestCode>,
    descriptors: Vec<ArtifactDescriptor>,
}

impl IsolatedContext {
    /// Reads every artifact's descriptor and compiles the code artifacts carry.
    /// Artifacts earlier in the list win when two of them export the same type.
    pub fn from_artifacts<'a, I>(
        name: impl Into<String>,
        artifacts: I,
        parent: Arc<dyn LoadingContext>,
        runtime: &GuestRuntime,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Artifact>,
    {
        let name = name.into();
        let mut types = HashMap::new();
        let mut code = HashMap::new();
        let mut descriptors = Vec::new();

        for artifact in artifacts {
            let unreadable = |reason: String| ExtensionLoadError::UnreadableArtifact {
                coordinate: artifact.coordinate().clone(),
                path: artifact.file().to_path_buf(),
                reason,
            };

            let descriptor = ArtifactDescriptor::read(artifact.file()).map_err(|e| unreadable(e.to_string()))?;
            let declared = descriptor.coordinate().map_err(|e| unreadable(e.to_string()))?;
            if &declared != artifact.coordinate() {
                return Err(unreadable(format!("descriptor declares [{declared}]")));
            }

            if let Some(bytes) = descriptor.module_bytes().map_err(|e| unreadable(e.to_string()))? {
                let compiled = runtime
                    .compile(&declared, &bytes)
                    .map_err(|source| ExtensionLoadError::InvalidModule {
                        coordinate: declared.clone(),
                        source,
                    })?;
                debug!(context = %name, artifact = %declared, bytes = bytes.len(), "Compiled artifact code");
                code.insert(declared.clone(), compiled);
            }

            for type_name in &descriptor.exports {
                types
                    .entry(type_name.clone())
                    .or_insert_with(|| artifact.coordinate().clone());
            }
            trace!(context = %name, artifact = %declared, exports = descriptor.exports.len(), "Indexed artifact");
            descriptors.push(descriptor);
        }

        Ok(Self {
            name,
            parent,
            types,
            code,
            descriptors,
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl LoadingContext for IsolatedContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_local(&self, type_name: &str) -> Option<TypeOrigin> {
        self.types
            .get(type_name)
            .map(|coordinate| TypeOrigin::Artifact(coordinate.clone()))
    }

    fn parent(&self) -> Option<&dyn LoadingContext> {
        Some(self.parent.as_ref())
    }

    fn service_declarations(&self, capability: &str) -> Vec<String> {
        self.descriptors
            .iter()
            .flat_map(|descriptor| descriptor.providers(capability))
            .cloned()
            .collect()
    }

    fn guest_code(&self, coordinate: &Coordinate) -> Option<&GuestCode> {
        self.code
            .get(coordinate)
            .or_else(|| self.parent.guest_code(coordinate))
    }
}

impl fmt::Debug for IsolatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedContext")
            .field("name", &self.name)
            .field("parent", &self.parent.name())
            .field("artifacts", &self.descriptors.len())
            .field("code", &self.code.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::guest::ABI_VERSION;
    use crate::guest::tests::{MANIFEST, guest_wat};
    use tempfile::TempDir;

    fn runtime() -> GuestRuntime {
        GuestRuntime::new().unwrap()
    }

    fn write(dir: &Path, descriptor: &ArtifactDescriptor) -> Artifact {
        let coordinate = descriptor.coordinate().unwrap();
        let path = dir.join(format!("{}-{}.json", coordinate.artifact(), coordinate.version()));
        fs::write(&path, descriptor.to_json_pretty().unwrap()).unwrap();
        Artifact::new(coordinate, path)
    }

    #[test]
    fn test_local_types_then_parent() {
        let temp_dir = TempDir::new().unwrap();
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let artifact = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&coordinate).with_export("org.example.ext.Foo"),
        );
        let host = Arc::new(HostContext::with_types(["io.keystone.api.Service"]));

        let context = IsolatedContext::from_artifacts("ext", [&artifact], host, &runtime()).unwrap();
        assert_eq!(
            context.find_local("org.example.ext.Foo"),
            Some(TypeOrigin::Artifact(coordinate))
        );
        assert_eq!(context.find_local("io.keystone.api.Service"), None);
        assert_eq!(context.resolve("io.keystone.api.Service"), Some(TypeOrigin::Host));
        assert_eq!(context.resolve("org.example.ext.Missing"), None);
    }

    #[test]
    fn test_first_artifact_wins_for_duplicate_exports() {
        let temp_dir = TempDir::new().unwrap();
        let first = Coordinate::parse("org.example:a:1.0").unwrap();
        let second = Coordinate::parse("org.example:b:1.0").unwrap();
        let artifacts = [
            write(temp_dir.path(), &ArtifactDescriptor::new(&first).with_export("org.example.Shared")),
            write(temp_dir.path(), &ArtifactDescriptor::new(&second).with_export("org.example.Shared")),
        ];

        let context =
            IsolatedContext::from_artifacts("ext", artifacts.iter(), Arc::new(HostContext::new()), &runtime()).unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(
            context.find_local("org.example.Shared"),
            Some(TypeOrigin::Artifact(first))
        );
    }

    #[test]
    fn test_service_declarations_are_local() {
        let temp_dir = TempDir::new().unwrap();
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let artifact = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&coordinate)
                .with_service("cap", "org.example.ext.One")
                .with_service("other", "org.example.ext.Two"),
        );

        let context =
            IsolatedContext::from_artifacts("ext", [&artifact], Arc::new(HostContext::new()), &runtime()).unwrap();
        assert_eq!(context.service_declarations("cap"), vec!["org.example.ext.One"]);
        assert!(context.service_declarations("missing").is_empty());
        assert!(HostContext::new().service_declarations("cap").is_empty());
    }

    #[test]
    fn test_parent_declarations_are_not_rediscovered() {
        let temp_dir = TempDir::new().unwrap();
        let host_artifact = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&Coordinate::parse("org.example:host:1.0").unwrap())
                .with_export("org.example.host.HostModule")
                .with_service("cap", "org.example.host.HostModule"),
        );
        let ext_artifact = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&Coordinate::parse("org.example:ext:1.0").unwrap())
                .with_service("cap", "org.example.ext.One"),
        );

        let parent: Arc<dyn LoadingContext> = Arc::new(
            IsolatedContext::from_artifacts("host", [&host_artifact], Arc::new(HostContext::new()), &runtime())
                .unwrap(),
        );
        let context = IsolatedContext::from_artifacts("ext", [&ext_artifact], parent, &runtime()).unwrap();

        assert!(context.resolve("org.example.host.HostModule").is_some());
        assert_eq!(context.service_declarations("cap"), vec!["org.example.ext.One"]);
    }

    #[test]
    fn test_unreadable_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let path = temp_dir.path().join("ext-1.0.json");
        fs::write(&path, b"garbage").unwrap();
        let artifact = Artifact::new(coordinate.clone(), &path);

        let result = IsolatedContext::from_artifacts("ext", [&artifact], Arc::new(HostContext::new()), &runtime());
        assert!(matches!(
            result,
            Err(ExtensionLoadError::UnreadableArtifact { .. })
        ));

        let other = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&Coordinate::parse("org.example:other:1.0").unwrap()),
        );
        let mislabeled = Artifact::new(coordinate, other.file());
        let result = IsolatedContext::from_artifacts("ext", [&mislabeled], Arc::new(HostContext::new()), &runtime());
        assert!(matches!(
            result,
            Err(ExtensionLoadError::UnreadableArtifact { .. })
        ));
    }

    #[test]
    fn test_artifact_code_is_compiled() {
        let temp_dir = TempDir::new().unwrap();
        let with_code = Coordinate::parse("org.example:ext:1.0").unwrap();
        let without_code = Coordinate::parse("org.example:util:1.0").unwrap();
        let artifacts = [
            write(
                temp_dir.path(),
                &ArtifactDescriptor::new(&with_code)
                    .with_export("org.example.ext.FooModule")
                    .with_module(guest_wat(ABI_VERSION, MANIFEST)),
            ),
            write(temp_dir.path(), &ArtifactDescriptor::new(&without_code)),
        ];

        let context =
            IsolatedContext::from_artifacts("ext", artifacts.iter(), Arc::new(HostContext::new()), &runtime())
                .unwrap();
        let code = context.guest_code(&with_code).unwrap();
        assert_eq!(code.coordinate(), &with_code);
        assert!(context.guest_code(&without_code).is_none());
        assert!(HostContext::new().guest_code(&with_code).is_none());
    }

    #[test]
    fn test_invalid_artifact_code() {
        let temp_dir = TempDir::new().unwrap();
        let coordinate = Coordinate::parse("org.example:ext:1.0").unwrap();
        let artifact = write(
            temp_dir.path(),
            &ArtifactDescriptor::new(&coordinate).with_module("(module (func $broken"),
        );

        let result = IsolatedContext::from_artifacts("ext", [&artifact], Arc::new(HostContext::new()), &runtime());
        assert!(matches!(result, Err(ExtensionLoadError::InvalidModule { .. })));

        let mut descriptor = ArtifactDescriptor::new(&coordinate);
        descriptor.module = Some("%%%".to_string());
        let artifact = write(temp_dir.path(), &descriptor);
        let result = IsolatedContext::from_artifacts("ext", [&artifact], Arc::new(HostContext::new()), &runtime());
        assert!(matches!(result, Err(ExtensionLoadError::UnreadableArtifact { .. })));
    }
}
