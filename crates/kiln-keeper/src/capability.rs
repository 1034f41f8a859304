//! Native ledger capabilities the keeper consumes: token transfer and account lookup.
//!
//! These are the only native actions a contract can reach through dispatch. New native
//! actions get their own narrow trait here rather than a generic router.

use std::sync::Arc;

use kiln_store::StoreError;
use thiserror::Error;

use crate::address::Address;
use crate::coin::Coin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub address: Address,
    pub balance: Vec<Coin>,
}

pub trait Bank: Send + Sync {
    /// Move `coins` from `from` to `to`, creating the recipient account if needed. All or none
    /// of the coins move.
    fn transfer(&self, from: &Address, to: &Address, coins: &[Coin]) -> Result<(), BankError>;
}

pub trait AccountLookup: Send + Sync {
    fn get_account(&self, address: &Address) -> Result<Option<AccountView>, BankError>;
}

pub type DynBank = Arc<dyn Bank>;
pub type DynAccounts = Arc<dyn AccountLookup>;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("insufficient funds: {address} has {available}{denom}, needs {needed}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: String,
        available: u128,
        needed: u128,
    },
    #[error("balance overflow for {address} in {denom}")]
    Overflow { address: Address, denom: String },
    #[error("bank store error: {0}")]
    Store(#[from] StoreError),
}
