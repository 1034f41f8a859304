//! A `ContractVm` whose contracts are closures registered under synthetic bytecode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kiln_cbor::Hash;
use kiln_store::DynKv;
use kiln_wasm::{ContractVm, Invocation, VmError, VmResponse};
use kiln_wasm_abi::{ContractEnv, Entrypoint};

/// VM gas charged for every invocation before the script runs.
pub const DEFAULT_CALL_COST: u64 = 50_000;

const SCRIPT_MAGIC: &[u8] = b"\0asm";
const SCRIPT_TAG: &[u8] = b"kiln-script:";

/// Arguments handed to a script for one invocation.
pub struct ScriptCall<'a> {
    pub entrypoint: Entrypoint,
    pub env: &'a ContractEnv,
    pub msg: &'a [u8],
    /// The contract's private store; read-only for queries.
    pub storage: &'a DynKv,
    pub gas_limit: u64,
}

impl ScriptCall<'_> {
    pub fn contract(&self) -> &str {
        &self.env.contract.address
    }

    pub fn signer(&self) -> Option<&str> {
        self.env.message.as_ref().map(|m| m.signer.as_str())
    }
}

/// One invocation as observed by the VM, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub program: String,
    pub entrypoint: Entrypoint,
    pub contract: String,
    pub signer: Option<String>,
    pub msg: Vec<u8>,
    pub gas_limit: u64,
}

type Script = Arc<dyn Fn(&ScriptCall<'_>) -> Result<VmResponse, VmError> + Send + Sync>;

struct Program {
    name: String,
    script: Script,
}

pub struct ScriptedVm {
    call_cost: u64,
    programs: Mutex<HashMap<Hash, Program>>,
    created: Mutex<HashMap<Hash, Vec<u8>>>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl Default for ScriptedVm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedVm {
    pub fn new() -> Self {
        Self::with_call_cost(DEFAULT_CALL_COST)
    }

    pub fn with_call_cost(call_cost: u64) -> Self {
        Self {
            call_cost,
            programs: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register `script` and return the bytecode that selects it. The bytecode still has to be
    /// uploaded through the keeper before it can be instantiated.
    pub fn program(
        &self,
        name: &str,
        script: impl Fn(&ScriptCall<'_>) -> Result<VmResponse, VmError> + Send + Sync + 'static,
    ) -> Vec<u8> {
        let bytecode = [SCRIPT_MAGIC, SCRIPT_TAG, name.as_bytes()].concat();
        self.programs.lock().unwrap().insert(
            Hash::of_bytes(&bytecode),
            Program {
                name: name.to_string(),
                script: Arc::new(script),
            },
        );
        bytecode
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn lookup(&self, code_hash: &Hash) -> Option<(String, Script)> {
        self.programs
            .lock()
            .unwrap()
            .get(code_hash)
            .map(|p| (p.name.clone(), p.script.clone()))
    }
}

impl ContractVm for ScriptedVm {
    fn create(&self, wasm: &[u8]) -> Result<Hash, VmError> {
        if !wasm.starts_with(SCRIPT_MAGIC) {
            return Err(VmError::Compile("missing wasm magic".into()));
        }
        let hash = Hash::of_bytes(wasm);
        if self.lookup(&hash).is_none() {
            return Err(VmError::Compile(format!("no script registered for {hash}")));
        }
        self.created.lock().unwrap().insert(hash, wasm.to_vec());
        Ok(hash)
    }

    fn get_code(&self, code_hash: Hash) -> Result<Vec<u8>, VmError> {
        self.created
            .lock()
            .unwrap()
            .get(&code_hash)
            .cloned()
            .ok_or(VmError::CodeNotFound(code_hash))
    }

    fn invoke(&self, call: Invocation<'_>, storage: DynKv) -> Result<VmResponse, VmError> {
        if !self.created.lock().unwrap().contains_key(&call.code_hash) {
            return Err(VmError::CodeNotFound(call.code_hash));
        }
        let (program, script) = self
            .lookup(&call.code_hash)
            .ok_or(VmError::CodeNotFound(call.code_hash))?;

        self.calls.lock().unwrap().push(ScriptedCall {
            program: program.clone(),
            entrypoint: call.entrypoint,
            contract: call.env.contract.address.clone(),
            signer: call.env.message.as_ref().map(|m| m.signer.clone()),
            msg: call.msg.to_vec(),
            gas_limit: call.gas_limit,
        });
        if self.call_cost > call.gas_limit {
            return Err(VmError::OutOfGas {
                limit: call.gas_limit,
            });
        }

        let script_call = ScriptCall {
            entrypoint: call.entrypoint,
            env: call.env,
            msg: call.msg,
            storage: &storage,
            gas_limit: call.gas_limit - self.call_cost,
        };
        let mut response = script(&script_call)?;
        response.gas_used = response.gas_used.saturating_add(self.call_cost);
        if response.gas_used > call.gas_limit {
            return Err(VmError::OutOfGas {
                limit: call.gas_limit,
            });
        }
        if call.entrypoint == Entrypoint::Query {
            response.messages.clear();
        }
        log::trace!("{program} {} used {}", call.entrypoint, response.gas_used);
        Ok(response)
    }
}
