use kiln_store::StoreError;
use kiln_wasm::VmError;
use thiserror::Error;

use crate::address::Address;
use crate::capability::BankError;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("account {0} already exists")]
    AccountExists(Address),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("invalid coins: {0}")]
    InvalidCoins(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("create wasm contract failed: {0}")]
    CreateFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("instantiate wasm contract failed: {0}")]
    InstantiateFailed(#[source] VmError),
    #[error("execute wasm contract failed: {0}")]
    ExecuteFailed(#[source] VmError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error("out of gas in location '{descriptor}': limit {limit}, consumed {consumed}")]
    OutOfGas {
        descriptor: String,
        limit: u64,
        consumed: u64,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl KeeperError {
    pub(crate) fn create_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        KeeperError::CreateFailed(Box::new(err))
    }
}

impl From<serde_cbor::Error> for KeeperError {
    fn from(err: serde_cbor::Error) -> Self {
        KeeperError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::Codec(err.to_string())
    }
}
