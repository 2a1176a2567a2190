//! Extension code running on WebAssembly.
//!
//! An artifact that implements provider modules carries a WebAssembly module. Every
//! provider instance gets its own [`Store`], so extensions never share guest state;
//! the host capabilities they may call are defined once on the runtime's [`Linker`].
//!
//! A guest module exports:
//!
//! - `memory` and `alloc(size: i32) -> i32`, which the host uses to pass input;
//! - `keystone_abi_version() -> i32`, which must return [`ABI_VERSION`];
//! - `keystone_describe(ptr: i32, len: i32) -> i32`, called with a provider type name
//!   and answering with the provider's [`GuestManifest`] as JSON;
//! - the functions listed in the manifest, called through [`GuestService::call`].
//!
//! Every call takes its input as a `(ptr, len)` pair and returns a pointer to two
//! little-endian `u32`s holding the `(ptr, len)` of its output.
//!
//! The host module `keystone` provides `log(level: i32, ptr: i32, len: i32)`, with
//! levels 0 (trace) to 4 (error).

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use keystone_codec::{SerializationExtension, TypeRegistrations};
use keystone_extension::ProviderModule;
use keystone_inject::{Binder, Module};
use keystone_store::Coordinate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, event};
use wasmtime::{Caller, Config, Engine, Extern, Instance, Linker, Module as WasmModule, Store};

/// Name of the host module guests import from.
pub const HOST_MODULE: &str = "keystone";

/// Version of the guest calling convention.
pub const ABI_VERSION: i32 = 1;

const DESCRIBE: &str = "keystone_describe";
const ABI_VERSION_EXPORT: &str = "keystone_abi_version";

#[derive(Debug, thiserror::Error)]
pub enum GuestError {
    #[error(transparent)]
    Runtime(#[from] wasmtime::Error),

    #[error("Guest does not export [{0}]")]
    MissingExport(String),

    #[error("Guest speaks ABI version {actual}, the host expects {expected}")]
    AbiVersion { expected: i32, actual: i32 },

    #[error("Guest memory access out of bounds: {0}")]
    Memory(#[from] wasmtime::MemoryAccessError),

    #[error("Input of {0} bytes does not fit into guest memory")]
    Oversized(usize),

    #[error("Guest output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider[{provider}] does not export function[{function}]")]
    UnknownFunction { provider: String, function: String },
}

/// What a provider type contributes, as described by its guest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestManifest {
    pub serialization: Vec<GuestTypes>,
    pub functions: Vec<String>,
}

/// A serialization extension declared by guest code. Its types are registered by
/// name and carried as [`keystone_codec::Document`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestTypes {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl SerializationExtension for GuestTypes {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self, types: &mut TypeRegistrations) {
        for name in &self.types {
            types.register_document(name.as_str());
        }
    }
}

/// Per-store data visible to host functions.
struct GuestState {
    artifact: String,
}

/// Compiles guest modules and links them against the host capabilities.
#[derive(Clone)]
pub struct GuestRuntime {
    engine: Engine,
    linker: Arc<Linker<GuestState>>,
}

impl GuestRuntime {
    pub fn new() -> Result<Self, wasmtime::Error> {
        let config = Config::new();
        let engine = Engine::new(&config)?;
        let mut linker = Linker::new(&engine);
        linker.func_wrap(HOST_MODULE, "log", host_log)?;
        Ok(Self {
            engine,
            linker: Arc::new(linker),
        })
    }

    /// Compiles the code of the artifact at `coordinate`. Both the binary and the text
    /// format are accepted.
    pub fn compile(&self, coordinate: &Coordinate, bytes: &[u8]) -> Result<GuestCode, wasmtime::Error> {
        let module = WasmModule::new(&self.engine, bytes)?;
        Ok(GuestCode {
            coordinate: coordinate.clone(),
            module,
            runtime: self.clone(),
        })
    }
}

impl fmt::Debug for GuestRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestRuntime").finish_non_exhaustive()
    }
}

/// Compiled code of one artifact.
#[derive(Clone)]
pub struct GuestCode {
    coordinate: Coordinate,
    module: WasmModule,
    runtime: GuestRuntime,
}

impl GuestCode {
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// Creates a provider instance of `type_name` in a fresh store.
    pub fn instantiate(&self, type_name: &str) -> Result<GuestProvider, GuestError> {
        let mut store = Store::new(
            &self.runtime.engine,
            GuestState {
                artifact: self.coordinate.to_string(),
            },
        );
        let instance = self.runtime.linker.instantiate(&mut store, &self.module)?;
        let mut guest = GuestInstance { store, instance };

        let version = guest
            .instance
            .get_typed_func::<(), i32>(&mut guest.store, ABI_VERSION_EXPORT)
            .map_err(|_| GuestError::MissingExport(ABI_VERSION_EXPORT.to_string()))?
            .call(&mut guest.store, ())?;
        if version != ABI_VERSION {
            return Err(GuestError::AbiVersion {
                expected: ABI_VERSION,
                actual: version,
            });
        }

        let manifest: GuestManifest = serde_json::from_slice(&guest.call(DESCRIBE, type_name.as_bytes())?)?;
        let name = intern(type_name);
        debug!(
            provider = name,
            artifact = %self.coordinate,
            types = manifest.serialization.len(),
            functions = manifest.functions.len(),
            "Instantiated guest provider"
        );

        Ok(GuestProvider {
            name,
            service: Arc::new(GuestService {
                provider: name,
                origin: self.coordinate.clone(),
                functions: manifest.functions.clone(),
                guest: Mutex::new(guest),
            }),
            manifest,
        })
    }
}

impl fmt::Debug for GuestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestCode")
            .field("coordinate", &self.coordinate)
            .finish_non_exhaustive()
    }
}

struct GuestInstance {
    store: Store<GuestState>,
    instance: Instance,
}

impl GuestInstance {
    fn call(&mut self, export: &str, input: &[u8]) -> Result<Vec<u8>, GuestError> {
        let store = &mut self.store;
        let memory = self
            .instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| GuestError::MissingExport("memory".to_string()))?;
        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&mut *store, "alloc")
            .map_err(|_| GuestError::MissingExport("alloc".to_string()))?;
        let function = self
            .instance
            .get_typed_func::<(i32, i32), i32>(&mut *store, export)
            .map_err(|_| GuestError::MissingExport(export.to_string()))?;

        let len = i32::try_from(input.len()).map_err(|_| GuestError::Oversized(input.len()))?;
        let ptr = alloc.call(&mut *store, len)?;
        memory.write(&mut *store, offset(ptr), input)?;

        let result = function.call(&mut *store, (ptr, len))?;
        let mut header = [0u8; 8];
        memory.read(&*store, offset(result), &mut header)?;
        let [p0, p1, p2, p3, l0, l1, l2, l3] = header;
        let out_ptr = u32::from_le_bytes([p0, p1, p2, p3]) as usize;
        let out_len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;

        let mut output = vec![0u8; out_len];
        memory.read(&*store, out_ptr, &mut output)?;
        Ok(output)
    }
}

/// Guest pointers are unsigned 32-bit offsets.
fn offset(ptr: i32) -> usize {
    ptr as u32 as usize
}

/// A provider module implemented by extension code.
///
/// Its serialization extensions come from the guest's manifest. In the final container
/// it binds its [`GuestService`] under its provider type name.
pub struct GuestProvider {
    name: &'static str,
    manifest: GuestManifest,
    service: Arc<GuestService>,
}

impl GuestProvider {
    pub fn manifest(&self) -> &GuestManifest {
        &self.manifest
    }

    pub fn service(&self) -> &Arc<GuestService> {
        &self.service
    }
}

impl Module for GuestProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn configure(&self, binder: &mut Binder) {
        binder.bind_shared(Some(self.name), self.service.clone());
    }
}

impl ProviderModule for GuestProvider {
    fn serialization_extensions(&self) -> Vec<Arc<dyn SerializationExtension>> {
        self.manifest
            .serialization
            .iter()
            .map(|types| Arc::new(types.clone()) as Arc<dyn SerializationExtension>)
            .collect()
    }
}

impl fmt::Debug for GuestProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestProvider")
            .field("name", &self.name)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

/// Calls into a guest provider's instance. Calls are serialized.
pub struct GuestService {
    provider: &'static str,
    origin: Coordinate,
    functions: Vec<String>,
    guest: Mutex<GuestInstance>,
}

impl GuestService {
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn origin(&self) -> &Coordinate {
        &self.origin
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    /// Calls `function` with a JSON argument and decodes its JSON result.
    pub fn call(&self, function: &str, input: &serde_json::Value) -> Result<serde_json::Value, GuestError> {
        if !self.functions.iter().any(|exported| exported == function) {
            return Err(GuestError::UnknownFunction {
                provider: self.provider.to_string(),
                function: function.to_string(),
            });
        }

        let input = serde_json::to_vec(input)?;
        let output = self
            .guest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .call(function, &input)?;
        Ok(serde_json::from_slice(&output)?)
    }
}

impl fmt::Debug for GuestService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestService")
            .field("provider", &self.provider)
            .field("origin", &self.origin)
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

fn host_log(mut caller: Caller<'_, GuestState>, level: i32, ptr: i32, len: i32) -> wasmtime::Result<()> {
    let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
        return Ok(());
    };
    let mut bytes = vec![0u8; offset(len)];
    memory.read(&caller, offset(ptr), &mut bytes)?;
    let message = String::from_utf8_lossy(&bytes);
    let artifact = caller.data().artifact.as_str();

    macro_rules! log_event {
        ($level:expr) => {
            event!(target: "keystone_extension", $level, artifact, "{message}")
        };
    }

    match level {
        0 => log_event!(Level::TRACE),
        1 => log_event!(Level::DEBUG),
        2 => log_event!(Level::INFO),
        3 => log_event!(Level::WARN),
        _ => log_event!(Level::ERROR),
    }
    Ok(())
}

static NAMES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(Default::default);

/// Module names are `&'static str`; guest provider names are kept for the life of the
/// process, once per distinct name.
fn intern(name: &str) -> &'static str {
    let mut names = NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = names.get(name) {
        return *existing;
    }
    let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
    names.insert(leaked);
    leaked
}
