//! Contract host keeper: code and contract registries, gas bridging, the invocation pipeline and
//! dispatch of contract-emitted messages.

pub mod address;
pub mod bank;
pub mod capability;
pub mod coin;
pub mod compress;
pub mod config;
pub mod context;
pub mod error;
pub mod gas;
pub mod genesis;
pub mod handler;
pub mod keeper;
pub mod keys;
pub mod query;
pub mod types;

pub use address::Address;
pub use bank::KvBank;
pub use capability::{AccountLookup, AccountView, Bank, BankError, DynAccounts, DynBank};
pub use coin::{Coin, parse_coins};
pub use config::KeeperConfig;
pub use context::Context;
pub use error::KeeperError;
pub use gas::{BasicGasMeter, GasBridge, GasMeter};
pub use genesis::{GenesisCode, GenesisContract, GenesisState};
pub use handler::{Event, Handler, HandlerResponse, Msg};
pub use keeper::{DispatchMessage, DynVm, Keeper};
pub use query::{ContractInfoResponse, Querier, QueryRequest};
pub use types::{CodeRecord, ContractRecord, Model};
