//! Transaction messages routed to the keeper, with stateless validation and emitted events.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::coin::{Coin, validate_coins};
use crate::config::KeeperConfig;
use crate::context::Context;
use crate::error::KeeperError;
use crate::keeper::Keeper;

pub const EVENT_TYPE_STORE_CODE: &str = "store_code";
pub const EVENT_TYPE_INSTANTIATE_CONTRACT: &str = "instantiate_contract";
pub const EVENT_TYPE_EXECUTE_CONTRACT: &str = "execute_contract";

pub const ATTRIBUTE_KEY_SENDER: &str = "sender";
pub const ATTRIBUTE_KEY_CODE_ID: &str = "code_id";
pub const ATTRIBUTE_KEY_CONTRACT_ADDRESS: &str = "contract_address";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    StoreCode {
        sender: Address,
        #[serde(with = "serde_bytes")]
        wasm_byte_code: Vec<u8>,
    },
    InstantiateContract {
        sender: Address,
        code_id: u64,
        #[serde(with = "serde_bytes")]
        init_msg: Vec<u8>,
        #[serde(default)]
        init_coins: Vec<Coin>,
    },
    ExecuteContract {
        sender: Address,
        contract: Address,
        #[serde(with = "serde_bytes")]
        msg: Vec<u8>,
        #[serde(default)]
        coins: Vec<Coin>,
    },
}

impl Msg {
    pub fn sender(&self) -> &Address {
        match self {
            Msg::StoreCode { sender, .. }
            | Msg::InstantiateContract { sender, .. }
            | Msg::ExecuteContract { sender, .. } => sender,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Msg::StoreCode { .. } => EVENT_TYPE_STORE_CODE,
            Msg::InstantiateContract { .. } => EVENT_TYPE_INSTANTIATE_CONTRACT,
            Msg::ExecuteContract { .. } => EVENT_TYPE_EXECUTE_CONTRACT,
        }
    }

    /// Checks that need no state: payload sizes, code id and coin lists.
    pub fn validate_basic(&self, config: &KeeperConfig) -> Result<(), KeeperError> {
        match self {
            Msg::StoreCode { wasm_byte_code, .. } => {
                if wasm_byte_code.is_empty() {
                    return Err(KeeperError::InvalidRequest("empty wasm code".into()));
                }
                if wasm_byte_code.len() > config.max_contract_size {
                    return Err(KeeperError::InvalidRequest(format!(
                        "wasm code size {} exceeds {}",
                        wasm_byte_code.len(),
                        config.max_contract_size
                    )));
                }
            }
            Msg::InstantiateContract {
                code_id,
                init_msg,
                init_coins,
                ..
            } => {
                if *code_id == 0 {
                    return Err(KeeperError::InvalidRequest("code id is required".into()));
                }
                check_msg_size(init_msg, config)?;
                validate_coins(init_coins)?;
            }
            Msg::ExecuteContract { msg, coins, .. } => {
                check_msg_size(msg, config)?;
                validate_coins(coins)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn check_msg_size(msg: &[u8], config: &KeeperConfig) -> Result<(), KeeperError> {
    if msg.len() > config.max_contract_msg_size {
        return Err(KeeperError::InvalidRequest(format!(
            "msg size {} exceeds {}",
            msg.len(),
            config.max_contract_msg_size
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub events: Vec<Event>,
}

impl HandlerResponse {
    pub fn event(&self, kind: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.kind == kind)
    }
}

pub struct Handler<'k> {
    keeper: &'k Keeper,
}

impl<'k> Handler<'k> {
    pub fn new(keeper: &'k Keeper) -> Self {
        Self { keeper }
    }

    /// Validate and apply `msg`. Response data: the big-endian code id for uploads, the
    /// address bytes for instantiation, the contract's data for execution.
    pub fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<HandlerResponse, KeeperError> {
        msg.validate_basic(self.keeper.config())?;
        match msg {
            Msg::StoreCode {
                sender,
                wasm_byte_code,
            } => {
                let code_id = self.keeper.store_code(sender, wasm_byte_code)?;
                Ok(HandlerResponse {
                    data: code_id.to_be_bytes().to_vec(),
                    events: vec![
                        Event::new(EVENT_TYPE_STORE_CODE)
                            .attribute(ATTRIBUTE_KEY_SENDER, sender)
                            .attribute(ATTRIBUTE_KEY_CODE_ID, code_id),
                    ],
                })
            }
            Msg::InstantiateContract {
                sender,
                code_id,
                init_msg,
                init_coins,
            } => {
                let contract =
                    self.keeper
                        .instantiate(ctx, sender, *code_id, init_msg, init_coins)?;
                Ok(HandlerResponse {
                    data: contract.as_bytes().to_vec(),
                    events: vec![
                        Event::new(EVENT_TYPE_INSTANTIATE_CONTRACT)
                            .attribute(ATTRIBUTE_KEY_SENDER, sender)
                            .attribute(ATTRIBUTE_KEY_CODE_ID, code_id)
                            .attribute(ATTRIBUTE_KEY_CONTRACT_ADDRESS, contract),
                    ],
                })
            }
            Msg::ExecuteContract {
                sender,
                contract,
                msg,
                coins,
            } => {
                let data = self.keeper.execute(ctx, contract, sender, coins, msg)?;
                Ok(HandlerResponse {
                    data: data.unwrap_or_default(),
                    events: vec![
                        Event::new(EVENT_TYPE_EXECUTE_CONTRACT)
                            .attribute(ATTRIBUTE_KEY_SENDER, sender)
                            .attribute(ATTRIBUTE_KEY_CONTRACT_ADDRESS, contract),
                    ],
                })
            }
        }
    }
}
