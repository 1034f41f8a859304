use std::sync::Arc;

use kiln_cbor::Hash;
use kiln_store::{DynKv, KvStore, KvStoreExt, ReadOnlyStore};
use kiln_wasm::{Invocation, VmError, VmResponse};
use kiln_wasm_abi::{BlockInfo, ContractEnv, ContractInfo, Entrypoint, MessageInfo};

use super::Keeper;
use crate::address::Address;
use crate::coin::{Coin, coins_to_wire};
use crate::context::Context;
use crate::error::KeeperError;
use crate::gas::BasicGasMeter;
use crate::handler::check_msg_size;
use crate::keys::{self, CONTRACT_PREFIX, LAST_INSTANCE_ID_KEY};
use crate::types::{CodeRecord, ContractRecord, Model};

impl Keeper {
    /// Create an instance of `code_id`, moving `deposit` from `creator` before `init` runs.
    ///
    /// The deposit is not returned if `init` fails; undoing it is left to the caller's
    /// transaction boundary.
    pub fn instantiate(
        &self,
        ctx: &mut Context,
        creator: &Address,
        code_id: u64,
        init_msg: &[u8],
        deposit: &[Coin],
    ) -> Result<Address, KeeperError> {
        let address = self.generate_contract_address(code_id)?;
        if let Some(existing) = self.accounts.get_account(&address)? {
            return Err(KeeperError::AccountExists(existing.address));
        }

        self.bank.transfer(creator, &address, deposit)?;

        let code = self.get_code_record(code_id)?;
        let env = self.contract_env(
            &ctx.block,
            &address,
            Some(MessageInfo {
                signer: creator.to_string(),
                sent_funds: coins_to_wire(deposit),
            }),
        )?;
        let storage = self.contract_store(&address);
        self.gas.charge_instance(ctx.gas_meter.as_mut())?;
        let response = self
            .call_vm(ctx, Entrypoint::Init, code.code_hash, &env, init_msg, storage)
            .map_err(KeeperError::InstantiateFailed)?;

        self.gas.reconcile(ctx.gas_meter.as_mut(), response.gas_used)?;
        self.dispatch_messages(ctx, &address, response.messages)?;

        self.set_contract_record(&ContractRecord::new(
            code_id,
            address,
            *creator,
            init_msg.to_vec(),
        ))?;
        log::debug!("instantiated code {code_id} at {address}");
        Ok(address)
    }

    /// Run `execute` on `contract` with `caller` as signer, after moving `funds` to it. Returns
    /// the contract's response data.
    pub fn execute(
        &self,
        ctx: &mut Context,
        contract: &Address,
        caller: &Address,
        funds: &[Coin],
        msg: &[u8],
    ) -> Result<Option<Vec<u8>>, KeeperError> {
        let (_, code) = self.contract_details(contract)?;

        self.bank.transfer(caller, contract, funds)?;

        let env = self.contract_env(
            &ctx.block,
            contract,
            Some(MessageInfo {
                signer: caller.to_string(),
                sent_funds: coins_to_wire(funds),
            }),
        )?;
        let storage = self.contract_store(contract);
        self.gas.charge_instance(ctx.gas_meter.as_mut())?;
        let response = self
            .call_vm(ctx, Entrypoint::Execute, code.code_hash, &env, msg, storage)
            .map_err(KeeperError::ExecuteFailed)?;

        self.gas.reconcile(ctx.gas_meter.as_mut(), response.gas_used)?;
        self.dispatch_messages(ctx, contract, response.messages)?;
        Ok(response.data)
    }

    /// Read-only smart query under its own gas meter of `query_gas_limit`.
    pub fn query(&self, ctx: &Context, contract: &Address, msg: &[u8]) -> Result<Vec<u8>, KeeperError> {
        check_msg_size(msg, &self.config)?;
        let mut meter = BasicGasMeter::new(self.config.query_gas_limit);
        let (_, code) = self.contract_details(contract)?;
        let env = self.contract_env(&ctx.block, contract, None)?;
        let storage: DynKv = Arc::new(ReadOnlyStore::new(self.contract_store(contract)));
        let response = self
            .vm
            .invoke(
                Invocation {
                    entrypoint: Entrypoint::Query,
                    code_hash: code.code_hash,
                    env: &env,
                    msg,
                    gas_limit: self.gas.budget_for(&meter),
                },
                storage,
            )
            .map_err(|err| KeeperError::Internal(err.to_string()))?;
        self.gas.reconcile(&mut meter, response.gas_used)?;
        Ok(response.data.unwrap_or_default())
    }

    /// Direct lookup in a contract's private store, bypassing the VM.
    pub fn read_raw_store_key(
        &self,
        contract: &Address,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, KeeperError> {
        Ok(self.contract_store(contract).get(key)?)
    }

    /// Every entry of a contract's private store in key order.
    pub fn contract_store_entries(&self, contract: &Address) -> Result<Vec<Model>, KeeperError> {
        Ok(self
            .contract_store(contract)
            .scan_prefix(&[])?
            .into_iter()
            .map(|(key, value)| Model { key, value })
            .collect())
    }

    pub fn get_contract_record(&self, contract: &Address) -> Result<ContractRecord, KeeperError> {
        self.store
            .get_cbor(&keys::contract_key(contract))?
            .ok_or_else(|| KeeperError::NotFound(format!("contract {contract}")))
    }

    /// All contract records ordered by address bytes.
    pub fn contract_records(&self) -> Result<Vec<ContractRecord>, KeeperError> {
        self.store
            .scan_prefix(&[CONTRACT_PREFIX])?
            .into_iter()
            .map(|(_, bytes)| serde_cbor::from_slice(&bytes).map_err(KeeperError::from))
            .collect()
    }

    /// Instance id the next instantiation will consume.
    pub fn next_instance_id(&self) -> Result<u64, KeeperError> {
        self.peek_sequence(LAST_INSTANCE_ID_KEY)
    }

    pub(crate) fn set_contract_record(&self, record: &ContractRecord) -> Result<(), KeeperError> {
        self.store
            .set_cbor(&keys::contract_key(&record.address), record)?;
        Ok(())
    }

    pub(crate) fn set_contract_store_entry(
        &self,
        contract: &Address,
        model: &Model,
    ) -> Result<(), KeeperError> {
        self.contract_store(contract).set(&model.key, &model.value)?;
        Ok(())
    }

    fn generate_contract_address(&self, code_id: u64) -> Result<Address, KeeperError> {
        let instance_id = self.increase_sequence(LAST_INSTANCE_ID_KEY)?;
        Ok(Address::for_contract(code_id, instance_id))
    }

    fn contract_details(
        &self,
        contract: &Address,
    ) -> Result<(ContractRecord, CodeRecord), KeeperError> {
        let record = self.get_contract_record(contract)?;
        let code = self.get_code_record(record.code_id)?;
        Ok((record, code))
    }

    fn contract_env(
        &self,
        block: &BlockInfo,
        contract: &Address,
        message: Option<MessageInfo>,
    ) -> Result<ContractEnv, KeeperError> {
        let balance = self
            .accounts
            .get_account(contract)?
            .map(|account| coins_to_wire(&account.balance))
            .unwrap_or_default();
        Ok(ContractEnv {
            block: block.clone(),
            message,
            contract: ContractInfo {
                address: contract.to_string(),
                balance,
            },
        })
    }

    fn call_vm(
        &self,
        ctx: &Context,
        entrypoint: Entrypoint,
        code_hash: Hash,
        env: &ContractEnv,
        msg: &[u8],
        storage: DynKv,
    ) -> Result<VmResponse, VmError> {
        let gas_limit = self.gas.budget_for(ctx.gas_meter.as_ref());
        log::debug!(
            "{entrypoint} {} with budget {gas_limit}",
            env.contract.address
        );
        self.vm.invoke(
            Invocation {
                entrypoint,
                code_hash,
                env,
                msg,
                gas_limit,
            },
            storage,
        )
    }
}
