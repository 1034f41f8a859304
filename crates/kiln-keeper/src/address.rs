//! 20-byte account addresses and deterministic contract address derivation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::KeeperError;

pub const ADDRESS_LEN: usize = 20;
/// Human-readable prefix of the text form (`kiln1` followed by 40 hex chars).
pub const ADDRESS_HRP: &str = "kiln";
const SEPARATOR: char = '1';

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Address of a plain account derived from an arbitrary label (dev funding, tests).
    pub fn from_label(label: &str) -> Self {
        Self::hash_truncated(label.as_bytes())
    }

    /// Contract address for instance `instance_id` of code `code_id`.
    ///
    /// The id packs `code_id` into the high 32 bits; either counter exceeding 32 bits can
    /// collide with another pair.
    pub fn for_contract(code_id: u64, instance_id: u64) -> Self {
        let contract_id = (code_id << 32).wrapping_add(instance_id);
        let mut buf = [0u8; ADDRESS_LEN];
        buf[0] = b'C';
        put_uvarint(&mut buf[1..], contract_id);
        Self::hash_truncated(&buf)
    }

    fn hash_truncated(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(out)
    }

    pub fn parse(s: &str) -> Result<Self, KeeperError> {
        let invalid = || KeeperError::InvalidAddress(s.to_string());
        let body = s
            .strip_prefix(ADDRESS_HRP)
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .ok_or_else(invalid)?;
        if body.len() != ADDRESS_LEN * 2 || body.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(invalid());
        }
        let bytes = hex::decode(body).map_err(|_| invalid())?;
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

/// Unsigned LEB128, truncated to the buffer (a u64 needs at most 10 bytes).
fn put_uvarint(buf: &mut [u8], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 && i < buf.len() {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    if i < buf.len() {
        buf[i] = value as u8;
        i += 1;
    }
    i
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_HRP}{SEPARATOR}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}
