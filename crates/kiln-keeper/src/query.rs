//! Read-side routes over the keeper, answering with JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::context::Context;
use crate::error::KeeperError;
use crate::keeper::Keeper;

pub const QUERY_BYTECODE: &str = "bytecode";
pub const QUERY_CODE_INFO: &str = "code_info";
pub const QUERY_CONTRACT_INFO: &str = "contract_info";
pub const QUERY_STORE: &str = "store";
pub const QUERY_MSG: &str = "msg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    Bytecode { code_id: u64 },
    CodeInfo { code_id: u64 },
    ContractInfo { contract_address: Address },
    /// Raw key lookup in the contract's private store.
    Store { contract_address: Address, key: Vec<u8> },
    /// Smart query through the contract's `query` entrypoint.
    Msg { contract_address: Address, msg: Vec<u8> },
}

#[derive(Deserialize)]
struct CodeIdParams {
    code_id: u64,
}

#[derive(Deserialize)]
struct ContractParams {
    contract_address: Address,
}

/// Bytes travel base64-encoded in request params.
#[derive(Deserialize)]
struct StoreParams {
    contract_address: Address,
    key: String,
}

#[derive(Deserialize)]
struct MsgParams {
    contract_address: Address,
    msg: String,
}

impl QueryRequest {
    /// Decode JSON params for `route`.
    pub fn parse(route: &str, data: &[u8]) -> Result<Self, KeeperError> {
        match route {
            QUERY_BYTECODE => {
                let params: CodeIdParams = parse_params(data)?;
                Ok(QueryRequest::Bytecode {
                    code_id: params.code_id,
                })
            }
            QUERY_CODE_INFO => {
                let params: CodeIdParams = parse_params(data)?;
                Ok(QueryRequest::CodeInfo {
                    code_id: params.code_id,
                })
            }
            QUERY_CONTRACT_INFO => {
                let params: ContractParams = parse_params(data)?;
                Ok(QueryRequest::ContractInfo {
                    contract_address: params.contract_address,
                })
            }
            QUERY_STORE => {
                let params: StoreParams = parse_params(data)?;
                Ok(QueryRequest::Store {
                    contract_address: params.contract_address,
                    key: decode_b64(&params.key)?,
                })
            }
            QUERY_MSG => {
                let params: MsgParams = parse_params(data)?;
                Ok(QueryRequest::Msg {
                    contract_address: params.contract_address,
                    msg: decode_b64(&params.msg)?,
                })
            }
            other => Err(KeeperError::InvalidRequest(format!(
                "unknown query route '{other}'"
            ))),
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            QueryRequest::Bytecode { .. } => QUERY_BYTECODE,
            QueryRequest::CodeInfo { .. } => QUERY_CODE_INFO,
            QueryRequest::ContractInfo { .. } => QUERY_CONTRACT_INFO,
            QueryRequest::Store { .. } => QUERY_STORE,
            QueryRequest::Msg { .. } => QUERY_MSG,
        }
    }
}

/// JSON view of a contract record; the init payload is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    pub code_id: u64,
    pub address: Address,
    pub creator: Address,
    pub init_msg: String,
}

pub struct Querier<'k> {
    keeper: &'k Keeper,
}

impl<'k> Querier<'k> {
    pub fn new(keeper: &'k Keeper) -> Self {
        Self { keeper }
    }

    pub fn query_route(
        &self,
        ctx: &Context,
        route: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, KeeperError> {
        let request = QueryRequest::parse(route, data)?;
        self.query(ctx, &request)
    }

    /// JSON response for `request`. Smart queries return the contract's bytes unchanged.
    pub fn query(&self, ctx: &Context, request: &QueryRequest) -> Result<Vec<u8>, KeeperError> {
        log::debug!("query route {}", request.route());
        match request {
            QueryRequest::Bytecode { code_id } => {
                let bytecode = self.keeper.get_bytecode(*code_id)?;
                to_json(&BASE64.encode(bytecode))
            }
            QueryRequest::CodeInfo { code_id } => {
                to_json(&self.keeper.get_code_record(*code_id)?)
            }
            QueryRequest::ContractInfo { contract_address } => {
                let record = self.keeper.get_contract_record(contract_address)?;
                to_json(&ContractInfoResponse {
                    code_id: record.code_id,
                    address: record.address,
                    creator: record.creator,
                    init_msg: BASE64.encode(&record.init_msg),
                })
            }
            QueryRequest::Store {
                contract_address,
                key,
            } => {
                let value = self.keeper.read_raw_store_key(contract_address, key)?;
                to_json(&value.map(|bytes| BASE64.encode(bytes)))
            }
            QueryRequest::Msg {
                contract_address,
                msg,
            } => self.keeper.query(ctx, contract_address, msg),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T, KeeperError> {
    serde_json::from_slice(data).map_err(|err| KeeperError::InvalidRequest(err.to_string()))
}

fn decode_b64(text: &str) -> Result<Vec<u8>, KeeperError> {
    BASE64
        .decode(text)
        .map_err(|err| KeeperError::InvalidRequest(format!("invalid base64: {err}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, KeeperError> {
    Ok(serde_json::to_vec_pretty(value)?)
}
