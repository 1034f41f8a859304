//! In-memory ledger around a keeper, with transaction rollback on failure.

use std::cell::Cell;
use std::sync::Arc;

use kiln_keeper::{
    Address, Coin, Context, GenesisState, Handler, HandlerResponse, Keeper, KeeperConfig,
    KeeperError, KvBank, Msg,
};
use kiln_store::{DynKv, MemBlobStore, MemKv};
use kiln_wasm::{ContractVm, WasmtimeVm};
use kiln_wasm_abi::BlockInfo;

/// Per-transaction gas limit in ledger gas units.
pub const DEFAULT_TX_GAS_LIMIT: u64 = 2_000_000;

pub struct TestLedger {
    kv: MemKv,
    bank: KvBank,
    keeper: Keeper,
    block: BlockInfo,
    gas_limit: u64,
    last_gas_used: Cell<u64>,
}

impl TestLedger {
    pub fn new(vm: Arc<dyn ContractVm>) -> Result<Self, KeeperError> {
        Self::with_config(vm, KeeperConfig::default())
    }

    pub fn with_config(vm: Arc<dyn ContractVm>, config: KeeperConfig) -> Result<Self, KeeperError> {
        let kv = MemKv::new();
        let store: DynKv = Arc::new(kv.clone());
        let bank = KvBank::new(store.clone());
        let keeper = Keeper::new(
            store,
            vm,
            Arc::new(bank.clone()),
            Arc::new(bank.clone()),
            config,
        )?;
        Ok(Self {
            kv,
            bank,
            keeper,
            block: BlockInfo {
                height: 1,
                time: 1_700_000_000,
                chain_id: "kiln-testnet".into(),
            },
            gas_limit: DEFAULT_TX_GAS_LIMIT,
            last_gas_used: Cell::new(0),
        })
    }

    /// Ledger backed by the wasmtime runtime and an in-memory blob store.
    pub fn with_wasmtime() -> anyhow::Result<Self> {
        let vm = WasmtimeVm::new(Arc::new(MemBlobStore::new()))?;
        Ok(Self::new(Arc::new(vm))?)
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn bank(&self) -> &KvBank {
        &self.bank
    }

    pub fn kv(&self) -> &MemKv {
        &self.kv
    }

    pub fn block(&self) -> &BlockInfo {
        &self.block
    }

    pub fn set_gas_limit(&mut self, gas_limit: u64) {
        self.gas_limit = gas_limit;
    }

    pub fn advance_block(&mut self) {
        self.block.height += 1;
        self.block.time += 5;
    }

    /// Gas consumed by the most recent transaction, whether or not it committed.
    pub fn last_gas_used(&self) -> u64 {
        self.last_gas_used.get()
    }

    pub fn context(&self) -> Context {
        Context::new(self.block.clone(), self.gas_limit)
    }

    /// Run `f` against a fresh context; every store write is undone if it fails.
    pub fn transact<T>(
        &self,
        f: impl FnOnce(&Keeper, &mut Context) -> Result<T, KeeperError>,
    ) -> Result<T, KeeperError> {
        let snapshot = self.kv.entries();
        let mut ctx = self.context();
        let result = f(&self.keeper, &mut ctx);
        self.last_gas_used.set(ctx.gas_consumed());
        if let Err(err) = &result {
            log::debug!("rolling back transaction: {err}");
            self.kv.restore(snapshot);
        }
        result
    }

    pub fn deliver(&self, msg: &Msg) -> Result<HandlerResponse, KeeperError> {
        self.transact(|keeper, ctx| Handler::new(keeper).handle(ctx, msg))
    }

    pub fn fund(&self, address: &Address, coins: &[Coin]) -> Result<(), KeeperError> {
        Ok(self.bank.credit(address, coins)?)
    }

    pub fn balance(&self, address: &Address, denom: &str) -> Result<u128, KeeperError> {
        Ok(self.bank.balance(address, denom)?)
    }

    pub fn store_code(&self, creator: &Address, wasm: &[u8]) -> Result<u64, KeeperError> {
        self.transact(|keeper, _| keeper.store_code(creator, wasm))
    }

    pub fn instantiate(
        &self,
        creator: &Address,
        code_id: u64,
        init_msg: &[u8],
        deposit: &[Coin],
    ) -> Result<Address, KeeperError> {
        self.transact(|keeper, ctx| keeper.instantiate(ctx, creator, code_id, init_msg, deposit))
    }

    pub fn execute(
        &self,
        contract: &Address,
        caller: &Address,
        funds: &[Coin],
        msg: &[u8],
    ) -> Result<Option<Vec<u8>>, KeeperError> {
        self.transact(|keeper, ctx| keeper.execute(ctx, contract, caller, funds, msg))
    }

    pub fn query(&self, contract: &Address, msg: &[u8]) -> Result<Vec<u8>, KeeperError> {
        self.keeper.query(&self.context(), contract, msg)
    }

    pub fn export_genesis(&self) -> Result<GenesisState, KeeperError> {
        self.keeper.export_genesis()
    }

    pub fn import_genesis(&self, state: &GenesisState) -> Result<(), KeeperError> {
        self.transact(|keeper, _| keeper.import_genesis(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedVm;
    use kiln_keeper::config::DEFAULT_INSTANCE_COST;
    use kiln_store::KvStore;
    use kiln_wasm::VmResponse;

    #[test]
    fn failed_transaction_rolls_back_writes() {
        let vm = Arc::new(ScriptedVm::new());
        let code = vm.program("fails-after-write", |call| {
            call.storage.set(b"touched", b"yes")?;
            Err(kiln_wasm::VmError::Contract("nope".into()))
        });
        let ledger = TestLedger::new(vm.clone()).unwrap();
        let creator = Address::from_label("creator");
        ledger.fund(&creator, &[Coin::new("ukiln", 10)]).unwrap();
        let code_id = ledger.store_code(&creator, &code).unwrap();
        let before = ledger.kv().entries();

        let err = ledger
            .instantiate(&creator, code_id, b"{}", &[Coin::new("ukiln", 10)])
            .unwrap_err();
        assert!(matches!(err, KeeperError::InstantiateFailed(_)));
        assert_eq!(ledger.kv().entries(), before);
        assert_eq!(ledger.balance(&creator, "ukiln").unwrap(), 10);
        assert_eq!(ledger.keeper().next_instance_id().unwrap(), 1);
    }

    #[test]
    fn successful_transaction_commits_and_reports_gas() {
        let vm = Arc::new(ScriptedVm::with_call_cost(1_000));
        let code = vm.program("noop", |_| Ok(VmResponse::default()));
        let ledger = TestLedger::new(vm).unwrap();
        let creator = Address::from_label("creator");
        let code_id = ledger.store_code(&creator, &code).unwrap();
        let contract = ledger.instantiate(&creator, code_id, b"{}", &[]).unwrap();
        assert_eq!(ledger.last_gas_used(), DEFAULT_INSTANCE_COST + 10);
        assert!(ledger.keeper().get_contract_record(&contract).is_ok());
        assert!(ledger.kv().has(&kiln_keeper::keys::contract_key(&contract)).unwrap());
    }
}
