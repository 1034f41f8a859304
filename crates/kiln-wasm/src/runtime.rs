//! Wasmtime-backed [`ContractVm`] with fuel metering and a compiled-module cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use kiln_cbor::Hash;
use kiln_store::{DynBlobStore, DynKv, StoreError};
use kiln_wasm_abi::{ContractInput, ContractOutput, Entrypoint, QueryInput, QueryOutput};
use sha2::{Digest, Sha256};
use wasmtime::{Config, Engine, ExternType, Instance, Linker, Module, Store, Trap};

use crate::host::{HostGasCosts, HostState, add_host_imports, guest_range};
use crate::{ALLOC_EXPORT, ContractVm, Invocation, MEMORY_EXPORT, VmError, VmResponse};

const WASMTIME_VERSION: &str = "36.0.3";

#[derive(Debug, Clone, Default)]
pub struct VmConfig {
    /// Directory for serialized compiled modules; `None` keeps the cache in memory only.
    pub module_cache_dir: Option<PathBuf>,
    pub host_costs: HostGasCosts,
}

/// Deterministic, fuel-metered runtime. Bytecode lives in `blobs`, keyed by its SHA-256.
pub struct WasmtimeVm {
    engine: Engine,
    blobs: DynBlobStore,
    host_costs: HostGasCosts,
    module_cache: Mutex<HashMap<Hash, Arc<Module>>>,
    disk_cache: Option<DiskCache>,
}

impl WasmtimeVm {
    pub fn new(blobs: DynBlobStore) -> Result<Self, VmError> {
        Self::with_config(blobs, VmConfig::default())
    }

    /// Build a runtime with deterministic configuration (no threads, fuel on, no debug info).
    pub fn with_config(blobs: DynBlobStore, config: VmConfig) -> Result<Self, VmError> {
        let mut cfg = Config::new();
        cfg.wasm_multi_value(true);
        cfg.wasm_threads(false);
        cfg.wasm_reference_types(true);
        cfg.consume_fuel(true);
        cfg.debug_info(false);
        cfg.cranelift_nan_canonicalization(true);
        let engine = Engine::new(&cfg)?;
        let disk_cache = match config.module_cache_dir {
            Some(dir) => {
                let fingerprint = engine_cache_fingerprint();
                let engine_dir = dir.join(&fingerprint);
                fs::create_dir_all(&engine_dir)
                    .with_context(|| format!("create cache dir {}", engine_dir.display()))?;
                Some(DiskCache {
                    root: dir,
                    engine_fingerprint: fingerprint,
                })
            }
            None => None,
        };
        Ok(Self {
            engine,
            blobs,
            host_costs: config.host_costs,
            module_cache: Mutex::new(HashMap::new()),
            disk_cache,
        })
    }

    fn run(
        &self,
        module: &Module,
        call: &Invocation<'_>,
        storage: DynKv,
    ) -> Result<VmResponse, VmError> {
        let mut store = Store::new(
            &self.engine,
            HostState::new(storage, self.host_costs.clone()),
        );
        store.set_fuel(call.gas_limit)?;

        let input = match call.entrypoint {
            Entrypoint::Query => QueryInput::new(call.env.clone(), call.msg.to_vec()).encode()?,
            Entrypoint::Init | Entrypoint::Execute => {
                ContractInput::new(call.env.clone(), call.msg.to_vec()).encode()?
            }
        };

        let outcome = self.call_entrypoint(&mut store, module, call.entrypoint, &input);
        let remaining = store.get_fuel().unwrap_or(0);
        let gas_used = call.gas_limit.saturating_sub(remaining);
        let output = outcome.map_err(|err| classify_failure(err, remaining, call.gas_limit))?;

        match call.entrypoint {
            Entrypoint::Query => {
                let output = QueryOutput::decode(&output)?;
                if let Some(reason) = output.error {
                    return Err(VmError::Contract(reason));
                }
                Ok(VmResponse {
                    data: Some(output.data),
                    messages: Vec::new(),
                    gas_used,
                })
            }
            Entrypoint::Init | Entrypoint::Execute => {
                let output = ContractOutput::decode(&output)?;
                if let Some(reason) = output.error {
                    return Err(VmError::Contract(reason));
                }
                Ok(VmResponse {
                    data: output.data,
                    messages: output.messages,
                    gas_used,
                })
            }
        }
    }

    fn call_entrypoint(
        &self,
        store: &mut Store<HostState>,
        module: &Module,
        entrypoint: Entrypoint,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        let mut linker = Linker::new(&self.engine);
        add_host_imports(&mut linker)?;
        let instance: Instance = linker.instantiate(&mut *store, module)?;
        let memory = instance
            .get_memory(&mut *store, MEMORY_EXPORT)
            .context("wasm export 'memory' not found")?;
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut *store, ALLOC_EXPORT)
            .context("wasm export 'alloc' not found")?;
        let entry = instance
            .get_typed_func::<(i32, i32), (i32, i32)>(&mut *store, entrypoint.export_name())
            .with_context(|| format!("wasm export '{entrypoint}' not found"))?;

        let input_len = i32::try_from(input.len()).context("input too large for wasm32")?;
        let input_ptr = alloc.call(&mut *store, input_len)?;
        memory.write(&mut *store, input_ptr as usize, input)?;

        let (out_ptr, out_len) = entry.call(&mut *store, (input_ptr, input_len))?;
        let range = guest_range(memory.data_size(&*store), out_ptr, out_len)
            .context("contract returned an output region outside its memory")?;
        Ok(memory.data(&*store)[range].to_vec())
    }

    fn module_for(&self, code_hash: Hash) -> Result<Arc<Module>, VmError> {
        if let Some(existing) = self.get_cached_module(&code_hash) {
            return Ok(existing);
        }
        if let Some(serialized) = self.load_serialized(&code_hash)? {
            self.insert_cached_module(code_hash, serialized.clone());
            return Ok(serialized);
        }
        let wasm = self.get_code(code_hash)?;
        let compiled = Arc::new(
            Module::new(&self.engine, &wasm).map_err(|err| VmError::Compile(format!("{err:#}")))?,
        );
        self.store_serialized(&code_hash, &compiled).ok();
        self.insert_cached_module(code_hash, compiled.clone());
        Ok(compiled)
    }

    fn get_cached_module(&self, key: &Hash) -> Option<Arc<Module>> {
        self.module_cache
            .lock()
            .expect("module cache poisoned")
            .get(key)
            .cloned()
    }

    fn insert_cached_module(&self, key: Hash, module: Arc<Module>) {
        let mut cache = self.module_cache.lock().expect("module cache poisoned");
        cache.entry(key).or_insert(module);
    }

    fn load_serialized(&self, key: &Hash) -> Result<Option<Arc<Module>>> {
        let Some(cache) = &self.disk_cache else {
            return Ok(None);
        };
        let path = cache.module_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = match fs::read(&path) {
            Ok(data) => data,
            Err(_) => {
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };
        // SAFETY: the file was produced by `Module::serialize` for an engine with the same
        // fingerprint; wasmtime rejects artifacts from incompatible engines.
        match unsafe { Module::deserialize(&self.engine, &bytes) } {
            Ok(module) => Ok(Some(Arc::new(module))),
            Err(_) => {
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    fn store_serialized(&self, key: &Hash, module: &Module) -> Result<()> {
        let Some(cache) = &self.disk_cache else {
            return Ok(());
        };
        let bytes = module
            .serialize()
            .context("serialize compiled contract module")?;
        let path = cache.module_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {}", parent.display()))?;
        }
        fs::write(&path, bytes)
            .with_context(|| format!("write serialized module {}", path.display()))?;
        Ok(())
    }
}

impl ContractVm for WasmtimeVm {
    fn create(&self, wasm: &[u8]) -> Result<Hash, VmError> {
        let module =
            Module::new(&self.engine, wasm).map_err(|err| VmError::Compile(format!("{err:#}")))?;
        validate_exports(&module)?;
        let code_hash = self.blobs.put_blob(wasm)?;
        self.store_serialized(&code_hash, &module).ok();
        self.insert_cached_module(code_hash, Arc::new(module));
        log::debug!("compiled contract code {code_hash} ({} bytes)", wasm.len());
        Ok(code_hash)
    }

    fn get_code(&self, code_hash: Hash) -> Result<Vec<u8>, VmError> {
        match self.blobs.get_blob(code_hash) {
            Ok(bytes) => Ok(bytes),
            Err(StoreError::BlobNotFound(hash)) => Err(VmError::CodeNotFound(hash)),
            Err(err) => Err(err.into()),
        }
    }

    fn invoke(&self, call: Invocation<'_>, storage: DynKv) -> Result<VmResponse, VmError> {
        let module = self.module_for(call.code_hash)?;
        log::debug!(
            "invoke {} on {} (gas limit {})",
            call.entrypoint,
            call.env.contract.address,
            call.gas_limit
        );
        let response = self.run(&module, &call, storage)?;
        log::debug!(
            "{} on {} used {} gas, emitted {} messages",
            call.entrypoint,
            call.env.contract.address,
            response.gas_used,
            response.messages.len()
        );
        Ok(response)
    }
}

fn validate_exports(module: &Module) -> Result<(), VmError> {
    let mut has_memory = false;
    let mut funcs = Vec::new();
    for export in module.exports() {
        match export.ty() {
            ExternType::Memory(_) if export.name() == MEMORY_EXPORT => has_memory = true,
            ExternType::Func(_) => funcs.push(export.name().to_string()),
            _ => {}
        }
    }
    if !has_memory {
        return Err(VmError::MissingExport(MEMORY_EXPORT.into()));
    }
    let required = std::iter::once(ALLOC_EXPORT)
        .chain(Entrypoint::ALL.iter().map(|entry| entry.export_name()));
    for name in required {
        if !funcs.iter().any(|func| func == name) {
            return Err(VmError::MissingExport(name.into()));
        }
    }
    Ok(())
}

fn classify_failure(err: anyhow::Error, remaining_fuel: u64, limit: u64) -> VmError {
    if matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) || remaining_fuel == 0 {
        return VmError::OutOfGas { limit };
    }
    let err = match err.downcast::<StoreError>() {
        Ok(store_err) => return VmError::Storage(store_err),
        Err(err) => err,
    };
    match err.downcast_ref::<Trap>() {
        Some(trap) => VmError::Trap(trap.to_string()),
        None => VmError::Runtime(err),
    }
}

struct DiskCache {
    root: PathBuf,
    engine_fingerprint: String,
}

impl DiskCache {
    fn module_path(&self, key: &Hash) -> PathBuf {
        self.root
            .join(&self.engine_fingerprint)
            .join(hex::encode(key.as_bytes()))
            .join("module.cmod")
    }
}

fn engine_cache_fingerprint() -> String {
    let desc = format!(
        "wasmtime:{version};arch:{arch};os:{os};multi_value:1;threads:0;ref_types:1;fuel:1;debug:0;nan_canon:1",
        version = WASMTIME_VERSION,
        arch = std::env::consts::ARCH,
        os = std::env::consts::OS,
    );
    let digest = Sha256::digest(desc.as_bytes());
    format!("engine-{:x}", digest)
}

#[cfg(test)]
impl WasmtimeVm {
    fn cached_module_count(&self) -> usize {
        self.module_cache
            .lock()
            .expect("module cache poisoned")
            .len()
    }
}
