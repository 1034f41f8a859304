//! Contract lifecycle: code registry, contract registry, invocation pipeline and dispatch.

mod code;
mod contract;
mod dispatch;
#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::DispatchMessage;

use std::sync::Arc;

use kiln_store::{DynKv, KvStore, PrefixStore};
use kiln_wasm::ContractVm;

use crate::address::Address;
use crate::capability::{DynAccounts, DynBank};
use crate::config::KeeperConfig;
use crate::error::KeeperError;
use crate::gas::GasBridge;
use crate::keys;

pub type DynVm = Arc<dyn ContractVm>;

/// Owns the keeper's region of the ledger store and the capabilities it calls out to.
pub struct Keeper {
    store: DynKv,
    vm: DynVm,
    bank: DynBank,
    accounts: DynAccounts,
    config: KeeperConfig,
    gas: GasBridge,
}

impl Keeper {
    pub fn new(
        store: DynKv,
        vm: DynVm,
        bank: DynBank,
        accounts: DynAccounts,
        config: KeeperConfig,
    ) -> Result<Self, KeeperError> {
        config.validate()?;
        let gas = GasBridge::from_config(&config);
        Ok(Self {
            store,
            vm,
            bank,
            accounts,
            config,
            gas,
        })
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn gas_bridge(&self) -> GasBridge {
        self.gas
    }

    pub(crate) fn vm(&self) -> &DynVm {
        &self.vm
    }

    /// Read/write view of a contract's private region.
    fn contract_store(&self, address: &Address) -> DynKv {
        Arc::new(PrefixStore::new(
            self.store.clone(),
            keys::contract_store_prefix(address),
        ))
    }

    /// Counter values as stored: the id the next allocation will hand out.
    fn peek_sequence(&self, key: &[u8]) -> Result<u64, KeeperError> {
        match self.store.get(key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    KeeperError::Codec(format!("sequence {} is not a u64", hex::encode(key)))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(1),
        }
    }

    fn increase_sequence(&self, key: &[u8]) -> Result<u64, KeeperError> {
        let id = self.peek_sequence(key)?;
        self.set_sequence(key, id.wrapping_add(1))?;
        Ok(id)
    }

    pub(crate) fn set_sequence(&self, key: &[u8], value: u64) -> Result<(), KeeperError> {
        self.store.set(key, &value.to_be_bytes())?;
        Ok(())
    }
}
