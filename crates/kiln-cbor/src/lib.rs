//! Deterministic CBOR encoding for persisted records and the SHA-256 digest that keys stored code.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_cbor::value::Value;
use sha2::{Digest, Sha256};

const DIGEST_TAG: &str = "sha256:";

/// Encode `value` so equal values always produce equal bytes.
///
/// Going through [`serde_cbor::Value`] first sorts map keys, which makes records built from
/// unordered maps hash the same regardless of insertion order.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let value: Value = serde_cbor::value::to_value(value)?;
    let mut out = Vec::new();
    let mut serializer = serde_cbor::Serializer::new(&mut out);
    serializer.self_describe()?;
    value.serialize(&mut serializer)?;
    Ok(out)
}

pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_cbor::Error> {
    serde_cbor::from_slice(bytes)
}

/// SHA-256 digest of uploaded contract code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Hash(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `sha256:` followed by 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("{DIGEST_TAG}{}", hex::encode(self.0))
    }

    pub fn from_hex_str(text: &str) -> Result<Self, HashParseError> {
        let digits = text
            .strip_prefix(DIGEST_TAG)
            .ok_or(HashParseError::MissingPrefix)?;
        let mut digest = [0u8; 32];
        match hex::decode_to_slice(digits, &mut digest) {
            Ok(()) => Ok(Hash(digest)),
            Err(hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength) => {
                Err(HashParseError::InvalidLength(digits.len()))
            }
            Err(err) => Err(HashParseError::InvalidHex(err)),
        }
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Always a string, in CBOR too, so a record's encoding does not depend on the format's byte support.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Hash::from_hex_str(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("code hash must start with '{DIGEST_TAG}'")]
    MissingPrefix,
    #[error("code hash needs 64 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("code hash is not hex: {0}")]
    InvalidHex(hex::FromHexError),
}
