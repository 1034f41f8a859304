//! Metered WASM contract runtime: the VM capability the keeper delegates compilation and
//! invocation to.

mod host;
mod runtime;

pub use host::HostGasCosts;
pub use runtime::{VmConfig, WasmtimeVm};

use kiln_cbor::Hash;
use kiln_store::{DynKv, StoreError};
use kiln_wasm_abi::{AbiDecodeError, AbiEncodeError, ContractEnv, Entrypoint, WireMessage};
use thiserror::Error;

/// Exports every contract module must provide besides its entrypoints.
pub const MEMORY_EXPORT: &str = "memory";
pub const ALLOC_EXPORT: &str = "alloc";

/// One call into a contract entrypoint.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub entrypoint: Entrypoint,
    pub code_hash: Hash,
    pub env: &'a ContractEnv,
    pub msg: &'a [u8],
    /// Budget in VM gas units.
    pub gas_limit: u64,
}

/// Result of a completed invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmResponse {
    pub data: Option<Vec<u8>>,
    /// Messages in emission order. Always empty for queries.
    pub messages: Vec<WireMessage>,
    pub gas_used: u64,
}

/// Compile/invoke capability consumed by the keeper.
pub trait ContractVm: Send + Sync {
    /// Validate and compile `wasm`, persist it content-addressed, and return its hash.
    fn create(&self, wasm: &[u8]) -> Result<Hash, VmError>;

    /// Original bytecode for a previously created hash.
    fn get_code(&self, code_hash: Hash) -> Result<Vec<u8>, VmError>;

    /// Run an entrypoint against `storage`, which is the contract's private region (read-only for
    /// queries).
    fn invoke(&self, call: Invocation<'_>, storage: DynKv) -> Result<VmResponse, VmError>;
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("compile failed: {0}")]
    Compile(String),
    #[error("module is missing required export '{0}'")]
    MissingExport(String),
    #[error("code {0} not found")]
    CodeNotFound(Hash),
    #[error("out of gas (limit {limit})")]
    OutOfGas { limit: u64 },
    #[error("contract returned error: {0}")]
    Contract(String),
    #[error("wasm trap: {0}")]
    Trap(String),
    #[error("contract output invalid: {0}")]
    AbiDecode(#[from] AbiDecodeError),
    #[error("contract input encoding failed: {0}")]
    AbiEncode(#[from] AbiEncodeError),
    #[error("contract storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("wasm runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
}
