//! Key layout of the keeper's region of the ledger store.

use crate::address::Address;

pub const CODE_PREFIX: u8 = 0x01;
pub const CONTRACT_PREFIX: u8 = 0x02;
pub const CONTRACT_STORE_PREFIX: u8 = 0x03;
pub const SEQUENCE_PREFIX: u8 = 0x04;

pub const LAST_CODE_ID_KEY: &[u8] = b"\x04lastCodeId";
pub const LAST_INSTANCE_ID_KEY: &[u8] = b"\x04lastContractId";

pub fn code_key(code_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(CODE_PREFIX);
    key.extend_from_slice(&code_id.to_be_bytes());
    key
}

pub fn contract_key(address: &Address) -> Vec<u8> {
    prefixed(CONTRACT_PREFIX, address)
}

/// Prefix of a contract's private store region.
pub fn contract_store_prefix(address: &Address) -> Vec<u8> {
    prefixed(CONTRACT_STORE_PREFIX, address)
}

fn prefixed(prefix: u8, address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + address.as_bytes().len());
    key.push(prefix);
    key.extend_from_slice(address.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_keys_sort_by_id() {
        assert!(code_key(2) < code_key(10));
        assert!(code_key(255) < code_key(256));
        assert_eq!(code_key(1)[0], CODE_PREFIX);
    }

    #[test]
    fn sequence_keys_share_prefix() {
        assert_eq!(LAST_CODE_ID_KEY[0], SEQUENCE_PREFIX);
        assert_eq!(LAST_INSTANCE_ID_KEY[0], SEQUENCE_PREFIX);
    }

    #[test]
    fn store_regions_do_not_overlap_records() {
        let addr = Address::from_label("x");
        assert_ne!(contract_key(&addr), contract_store_prefix(&addr));
        assert_eq!(contract_store_prefix(&addr).len(), 21);
    }
}
