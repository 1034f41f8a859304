use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use kiln_cbor::Hash;
use kiln_store::{DynKv, MemKv};
use kiln_wasm::{ContractVm, Invocation, VmError, VmResponse};
use kiln_wasm_abi::{BlockInfo, ContractEnv, Entrypoint};

use super::Keeper;
use crate::bank::KvBank;
use crate::config::KeeperConfig;
use crate::context::Context;

type Reply = Box<dyn FnOnce(&DynKv) -> Result<VmResponse, VmError> + Send>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub entrypoint: Entrypoint,
    pub env: ContractEnv,
    pub msg: Vec<u8>,
    pub gas_limit: u64,
}

/// Accepts any bytes starting with `\0asm`; invocations pop queued replies in order and
/// default to an empty response using 1000 gas.
#[derive(Default)]
pub(crate) struct StubVm {
    codes: Mutex<HashMap<Hash, Vec<u8>>>,
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubVm {
    pub fn reply(&self, f: impl FnOnce(&DynKv) -> Result<VmResponse, VmError> + Send + 'static) {
        self.replies.lock().unwrap().push_back(Box::new(f));
    }

    pub fn code_count(&self) -> usize {
        self.codes.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ContractVm for StubVm {
    fn create(&self, wasm: &[u8]) -> Result<Hash, VmError> {
        if !wasm.starts_with(b"\0asm") {
            return Err(VmError::Compile("missing wasm magic".into()));
        }
        let hash = Hash::of_bytes(wasm);
        self.codes.lock().unwrap().insert(hash, wasm.to_vec());
        Ok(hash)
    }

    fn get_code(&self, code_hash: Hash) -> Result<Vec<u8>, VmError> {
        self.codes
            .lock()
            .unwrap()
            .get(&code_hash)
            .cloned()
            .ok_or(VmError::CodeNotFound(code_hash))
    }

    fn invoke(&self, call: Invocation<'_>, storage: DynKv) -> Result<VmResponse, VmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            entrypoint: call.entrypoint,
            env: call.env.clone(),
            msg: call.msg.to_vec(),
            gas_limit: call.gas_limit,
        });
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply(&storage),
            None => Ok(VmResponse {
                gas_used: 1000,
                ..VmResponse::default()
            }),
        }
    }
}

pub(crate) struct Fixture {
    pub keeper: Keeper,
    pub vm: Arc<StubVm>,
    pub bank: KvBank,
    pub kv: MemKv,
}

pub(crate) fn fixture(vm: StubVm) -> Fixture {
    fixture_with_config(vm, KeeperConfig::default())
}

pub(crate) fn fixture_with_config(vm: StubVm, config: KeeperConfig) -> Fixture {
    let kv = MemKv::new();
    let store: DynKv = Arc::new(kv.clone());
    let bank = KvBank::new(store.clone());
    let vm = Arc::new(vm);
    let keeper = Keeper::new(
        store,
        vm.clone(),
        Arc::new(bank.clone()),
        Arc::new(bank.clone()),
        config,
    )
    .unwrap();
    Fixture {
        keeper,
        vm,
        bank,
        kv,
    }
}

pub(crate) fn ctx(gas_limit: u64) -> Context {
    Context::new(
        BlockInfo {
            height: 7,
            time: 1_700_000_000,
            chain_id: "kiln-test".into(),
        },
        gas_limit,
    )
}
