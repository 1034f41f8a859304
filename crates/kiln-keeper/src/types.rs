use kiln_cbor::Hash;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Registered bytecode. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub code_id: u64,
    pub code_hash: Hash,
    pub creator: Address,
}

impl CodeRecord {
    pub fn new(code_id: u64, code_hash: Hash, creator: Address) -> Self {
        Self {
            code_id,
            code_hash,
            creator,
        }
    }
}

/// Contract instance metadata. Immutable once written; the code id cannot be swapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub code_id: u64,
    pub address: Address,
    pub creator: Address,
    #[serde(with = "serde_bytes")]
    pub init_msg: Vec<u8>,
}

impl ContractRecord {
    pub fn new(code_id: u64, address: Address, creator: Address, init_msg: Vec<u8>) -> Self {
        Self {
            code_id,
            address,
            creator,
            init_msg,
        }
    }
}

/// One entry of a contract's private store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}
