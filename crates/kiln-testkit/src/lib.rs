//! Test utilities for exercising the keeper with deterministic fixtures.
//!
//! - `scripted`: a `ContractVm` whose contracts are Rust closures, for pipeline and dispatch tests
//! - `fixtures`: WAT contract builder for end-to-end runs through the real runtime
//! - `TestLedger`: keeper, bank and in-memory store with per-transaction rollback

pub mod fixtures;
pub mod ledger;
pub mod scripted;

pub use fixtures::WatContract;
pub use ledger::TestLedger;
pub use scripted::{ScriptCall, ScriptedCall, ScriptedVm};

use kiln_keeper::{Address, Coin};

/// Deterministic account address for a human-readable label.
pub fn account(label: &str) -> Address {
    Address::from_label(label)
}

pub fn coins(amount: u128, denom: &str) -> Vec<Coin> {
    vec![Coin::new(denom, amount)]
}
