//! Snapshot of the keeper's state for chain export and re-import.

use std::collections::BTreeSet;

use kiln_store::StoreError;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::KeeperError;
use crate::keeper::Keeper;
use crate::keys::{LAST_CODE_ID_KEY, LAST_INSTANCE_ID_KEY};
use crate::types::{CodeRecord, ContractRecord, Model};

/// Counters hold the stored sequence values, i.e. the ids the next allocations return.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisState {
    pub last_code_id: u64,
    pub last_instance_id: u64,
    pub codes: Vec<GenesisCode>,
    pub contracts: Vec<GenesisContract>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCode {
    pub code_id: u64,
    pub record: CodeRecord,
    #[serde(with = "serde_bytes")]
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisContract {
    pub address: Address,
    pub record: ContractRecord,
    pub models: Vec<Model>,
}

impl GenesisState {
    /// Structural checks that need no store access.
    pub fn validate(&self) -> Result<(), KeeperError> {
        let mut code_ids = BTreeSet::new();
        for code in &self.codes {
            if code.code_id == 0 || code.code_id != code.record.code_id {
                return Err(KeeperError::InvalidRequest(format!(
                    "genesis code {} has inconsistent id",
                    code.code_id
                )));
            }
            if code.code_id >= self.last_code_id {
                return Err(KeeperError::InvalidRequest(format!(
                    "genesis code {} is not below last_code_id {}",
                    code.code_id, self.last_code_id
                )));
            }
            if !code_ids.insert(code.code_id) {
                return Err(KeeperError::InvalidRequest(format!(
                    "duplicate genesis code {}",
                    code.code_id
                )));
            }
        }
        let mut addresses = BTreeSet::new();
        for contract in &self.contracts {
            if contract.address != contract.record.address {
                return Err(KeeperError::InvalidRequest(format!(
                    "genesis contract {} has inconsistent address",
                    contract.address
                )));
            }
            if !code_ids.contains(&contract.record.code_id) {
                return Err(KeeperError::InvalidRequest(format!(
                    "genesis contract {} references unknown code {}",
                    contract.address, contract.record.code_id
                )));
            }
            if !addresses.insert(contract.address) {
                return Err(KeeperError::InvalidRequest(format!(
                    "duplicate genesis contract {}",
                    contract.address
                )));
            }
        }
        Ok(())
    }
}

impl Keeper {
    pub fn export_genesis(&self) -> Result<GenesisState, KeeperError> {
        let codes = self
            .code_records()?
            .into_iter()
            .map(|record| {
                Ok(GenesisCode {
                    code_id: record.code_id,
                    bytecode: self.get_bytecode(record.code_id)?,
                    record,
                })
            })
            .collect::<Result<Vec<_>, KeeperError>>()?;
        let contracts = self
            .contract_records()?
            .into_iter()
            .map(|record| {
                Ok(GenesisContract {
                    address: record.address,
                    models: self.contract_store_entries(&record.address)?,
                    record,
                })
            })
            .collect::<Result<Vec<_>, KeeperError>>()?;
        Ok(GenesisState {
            last_code_id: self.next_code_id()?,
            last_instance_id: self.next_instance_id()?,
            codes,
            contracts,
        })
    }

    /// Load `state` into an empty keeper. Bytecode is recompiled and must hash to the record.
    pub fn import_genesis(&self, state: &GenesisState) -> Result<(), KeeperError> {
        state.validate()?;
        for code in &state.codes {
            let code_hash = self
                .vm()
                .create(&code.bytecode)
                .map_err(KeeperError::create_failed)?;
            if code_hash != code.record.code_hash {
                return Err(KeeperError::create_failed(StoreError::HashMismatch {
                    expected: code.record.code_hash,
                    actual: code_hash,
                }));
            }
            self.set_code_record(&code.record)?;
        }
        for contract in &state.contracts {
            self.set_contract_record(&contract.record)?;
            for model in &contract.models {
                self.set_contract_store_entry(&contract.address, model)?;
            }
        }
        self.set_sequence(LAST_CODE_ID_KEY, state.last_code_id)?;
        self.set_sequence(LAST_INSTANCE_ID_KEY, state.last_instance_id)?;
        log::debug!(
            "imported {} codes and {} contracts",
            state.codes.len(),
            state.contracts.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::test_support::{StubVm, ctx, fixture};
    use kiln_cbor::Hash;
    use kiln_store::KvStore;
    use kiln_wasm::VmResponse;

    fn populated() -> (crate::keeper::test_support::Fixture, Address) {
        let fx = fixture(StubVm::default());
        let creator = Address::from_label("creator");
        let code_id = fx.keeper.store_code(&creator, b"\0asm-counter").unwrap();
        fx.keeper.store_code(&creator, b"\0asm-unused").unwrap();
        fx.vm.reply(|storage| {
            storage.set(b"count", b"1")?;
            storage.set(b"owner", b"creator")?;
            Ok(VmResponse::default())
        });
        let mut tx = ctx(1_000_000);
        let contract = fx
            .keeper
            .instantiate(&mut tx, &creator, code_id, b"{}", &[])
            .unwrap();
        (fx, contract)
    }

    #[test]
    fn export_import_round_trip() {
        let (source, contract) = populated();
        let state = source.keeper.export_genesis().unwrap();
        assert_eq!(state.last_code_id, 3);
        assert_eq!(state.last_instance_id, 2);
        assert_eq!(state.codes.len(), 2);
        assert_eq!(state.contracts[0].models.len(), 2);

        let bytes = kiln_cbor::to_canonical_cbor(&state).unwrap();
        let decoded: GenesisState = kiln_cbor::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, state);

        let target = fixture(StubVm::default());
        target.keeper.import_genesis(&decoded).unwrap();
        assert_eq!(target.keeper.get_bytecode(1).unwrap(), b"\0asm-counter");
        assert_eq!(
            target.keeper.get_contract_record(&contract).unwrap(),
            source.keeper.get_contract_record(&contract).unwrap()
        );
        assert_eq!(
            target.keeper.contract_store_entries(&contract).unwrap(),
            source.keeper.contract_store_entries(&contract).unwrap()
        );
        assert_eq!(target.keeper.next_code_id().unwrap(), 3);
        assert_eq!(target.keeper.export_genesis().unwrap(), state);
    }

    #[test]
    fn import_rejects_tampered_bytecode() {
        let (source, _) = populated();
        let mut state = source.keeper.export_genesis().unwrap();
        state.codes[0].bytecode = b"\0asm-evil".to_vec();

        let target = fixture(StubVm::default());
        let err = target.keeper.import_genesis(&state).unwrap_err();
        assert!(matches!(err, KeeperError::CreateFailed(_)));
    }

    #[test]
    fn validate_catches_dangling_references() {
        let mut state = GenesisState {
            last_code_id: 2,
            last_instance_id: 2,
            codes: vec![GenesisCode {
                code_id: 1,
                record: CodeRecord::new(1, Hash::of_bytes(b"x"), Address::from_label("c")),
                bytecode: b"x".to_vec(),
            }],
            contracts: vec![],
        };
        assert!(state.validate().is_ok());

        let addr = Address::for_contract(5, 1);
        state.contracts.push(GenesisContract {
            address: addr,
            record: ContractRecord::new(5, addr, Address::from_label("c"), vec![]),
            models: vec![],
        });
        assert!(matches!(
            state.validate(),
            Err(KeeperError::InvalidRequest(msg)) if msg.contains("unknown code")
        ));

        state.contracts.clear();
        state.last_code_id = 1;
        assert!(state.validate().is_err());
    }
}
