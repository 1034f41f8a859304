use kiln_store::{KvStore, KvStoreExt};
use kiln_wasm::VmError;

use super::Keeper;
use crate::address::Address;
use crate::compress;
use crate::error::KeeperError;
use crate::keys::{self, CODE_PREFIX, LAST_CODE_ID_KEY};
use crate::types::CodeRecord;

impl Keeper {
    /// Compile and register `wasm` (plain or gzip), returning the new code id.
    pub fn store_code(&self, creator: &Address, wasm: &[u8]) -> Result<u64, KeeperError> {
        let wasm = compress::uncompress(wasm, self.config.max_contract_size)
            .map_err(KeeperError::create_failed)?;
        let code_hash = self.vm.create(&wasm).map_err(KeeperError::create_failed)?;
        let code_id = self.increase_sequence(LAST_CODE_ID_KEY)?;
        self.set_code_record(&CodeRecord::new(code_id, code_hash, *creator))?;
        log::debug!("stored code {code_id} ({code_hash}) from {creator}");
        Ok(code_id)
    }

    pub fn get_code_record(&self, code_id: u64) -> Result<CodeRecord, KeeperError> {
        self.store
            .get_cbor(&keys::code_key(code_id))?
            .ok_or_else(|| KeeperError::NotFound(format!("code {code_id}")))
    }

    /// Original (uncompressed) bytecode of a registered code id.
    pub fn get_bytecode(&self, code_id: u64) -> Result<Vec<u8>, KeeperError> {
        let record = self.get_code_record(code_id)?;
        self.vm.get_code(record.code_hash).map_err(|err| match err {
            VmError::CodeNotFound(hash) => KeeperError::NotFound(format!("bytecode {hash}")),
            other => KeeperError::Internal(other.to_string()),
        })
    }

    /// Id the next successful upload will receive.
    pub fn next_code_id(&self) -> Result<u64, KeeperError> {
        self.peek_sequence(LAST_CODE_ID_KEY)
    }

    /// All code records in ascending id order.
    pub fn code_records(&self) -> Result<Vec<CodeRecord>, KeeperError> {
        self.store
            .scan_prefix(&[CODE_PREFIX])?
            .into_iter()
            .map(|(_, bytes)| serde_cbor::from_slice(&bytes).map_err(KeeperError::from))
            .collect()
    }

    pub(crate) fn set_code_record(&self, record: &CodeRecord) -> Result<(), KeeperError> {
        self.store
            .set_cbor(&keys::code_key(record.code_id), record)?;
        Ok(())
    }
}
