//! Contract ABI envelopes shared by the host and contract modules.
//!
//! The host writes a CBOR [`ContractInput`] (or [`QueryInput`]) into guest memory, calls the
//! entrypoint export, and reads back a CBOR [`ContractOutput`] (or [`QueryOutput`]). Addresses
//! and coin amounts travel as strings; the host parses them before acting on them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current ABI version carried in input envelopes.
pub const ABI_VERSION: u8 = 1;

/// Contract entrypoints the host may call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entrypoint {
    Init,
    Execute,
    Query,
}

impl Entrypoint {
    pub const ALL: [Entrypoint; 3] = [Entrypoint::Init, Entrypoint::Execute, Entrypoint::Query];

    /// Name of the wasm export implementing this entrypoint.
    pub fn export_name(self) -> &'static str {
        match self {
            Entrypoint::Init => "init",
            Entrypoint::Execute => "execute",
            Entrypoint::Query => "query",
        }
    }
}

impl std::fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.export_name())
    }
}

/// Coin as it crosses the ABI: the amount is a decimal string.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct WireCoin {
    pub denom: String,
    pub amount: String,
}

impl WireCoin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub height: u64,
    /// Block time in seconds since the unix epoch.
    pub time: u64,
    pub chain_id: String,
}

/// Who invoked the contract and what they attached.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MessageInfo {
    pub signer: String,
    #[serde(default)]
    pub sent_funds: Vec<WireCoin>,
}

/// The contract's own account view at invocation time.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContractInfo {
    pub address: String,
    #[serde(default)]
    pub balance: Vec<WireCoin>,
}

/// Per-call environment. `message` is absent for queries.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContractEnv {
    pub block: BlockInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageInfo>,
    pub contract: ContractInfo,
}

/// Input envelope for `init` and `execute` (host → contract).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ContractInput {
    pub version: u8,
    pub env: ContractEnv,
    #[serde(with = "serde_bytes")]
    pub msg: Vec<u8>,
}

impl ContractInput {
    pub fn new(env: ContractEnv, msg: Vec<u8>) -> Self {
        Self {
            version: ABI_VERSION,
            env,
            msg,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AbiDecodeError> {
        let input: ContractInput = serde_cbor::from_slice(bytes)?;
        if input.version != ABI_VERSION {
            return Err(AbiDecodeError::UnsupportedVersion {
                found: input.version,
            });
        }
        Ok(input)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AbiEncodeError> {
        serde_cbor::to_vec(self).map_err(AbiEncodeError::Cbor)
    }
}

/// Output envelope for `init` and `execute` (contract → host).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
pub struct ContractOutput {
    #[serde(default, with = "serde_bytes")]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    /// Set when the contract rejects the call; the host treats it as a VM failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContractOutput {
    pub fn with_messages(messages: Vec<WireMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AbiDecodeError> {
        serde_cbor::from_slice(bytes).map_err(AbiDecodeError::Cbor)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AbiEncodeError> {
        serde_cbor::to_vec(self).map_err(AbiEncodeError::Cbor)
    }
}

/// Input envelope for `query` (host → contract).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct QueryInput {
    pub version: u8,
    pub env: ContractEnv,
    #[serde(with = "serde_bytes")]
    pub msg: Vec<u8>,
}

impl QueryInput {
    pub fn new(env: ContractEnv, msg: Vec<u8>) -> Self {
        Self {
            version: ABI_VERSION,
            env,
            msg,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AbiDecodeError> {
        let input: QueryInput = serde_cbor::from_slice(bytes)?;
        if input.version != ABI_VERSION {
            return Err(AbiDecodeError::UnsupportedVersion {
                found: input.version,
            });
        }
        Ok(input)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AbiEncodeError> {
        serde_cbor::to_vec(self).map_err(AbiEncodeError::Cbor)
    }
}

/// Output envelope for `query` (contract → host).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
pub struct QueryOutput {
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutput {
    pub fn decode(bytes: &[u8]) -> Result<Self, AbiDecodeError> {
        serde_cbor::from_slice(bytes).map_err(AbiDecodeError::Cbor)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AbiEncodeError> {
        serde_cbor::to_vec(self).map_err(AbiEncodeError::Cbor)
    }
}

/// Message emitted by a contract. Exactly one field is expected to be populated; the host
/// validates that before routing, so several populated fields are representable here.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractCallMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque: Option<OpaqueMsg>,
}

impl WireMessage {
    pub fn transfer(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Vec<WireCoin>,
    ) -> Self {
        Self {
            transfer: Some(TransferMsg {
                from_address: from.into(),
                to_address: to.into(),
                amount,
            }),
            ..Self::default()
        }
    }

    pub fn contract_call(
        contract: impl Into<String>,
        msg: Vec<u8>,
        funds: Vec<WireCoin>,
    ) -> Self {
        Self {
            contract: Some(ContractCallMsg {
                contract_addr: contract.into(),
                msg,
                send: funds,
            }),
            ..Self::default()
        }
    }

    pub fn opaque(data: Vec<u8>) -> Self {
        Self {
            opaque: Some(OpaqueMsg { data }),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct TransferMsg {
    pub from_address: String,
    pub to_address: String,
    #[serde(default)]
    pub amount: Vec<WireCoin>,
}

impl TransferMsg {
    pub fn is_empty(&self) -> bool {
        self.from_address.is_empty() && self.to_address.is_empty() && self.amount.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct ContractCallMsg {
    pub contract_addr: String,
    #[serde(default, with = "serde_bytes")]
    pub msg: Vec<u8>,
    #[serde(default)]
    pub send: Vec<WireCoin>,
}

impl ContractCallMsg {
    pub fn is_empty(&self) -> bool {
        self.contract_addr.is_empty() && self.msg.is_empty() && self.send.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct OpaqueMsg {
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl OpaqueMsg {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum AbiDecodeError {
    #[error("ABI version {found} is not supported (expected {ABI_VERSION})")]
    UnsupportedVersion { found: u8 },
    #[error("failed to decode envelope: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

#[derive(Debug, Error)]
pub enum AbiEncodeError {
    #[error("failed to encode envelope: {0}")]
    Cbor(#[from] serde_cbor::Error),
}
