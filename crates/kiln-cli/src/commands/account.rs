//! `kiln address`, `kiln fund` and `kiln balance`.

use anyhow::Result;
use clap::Args;
use kiln_keeper::Address;
use serde_json::json;

use crate::ledger::LocalLedger;
use crate::opts::{HomeOpts, parse_address, parse_funds};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Label the address is derived from
    pub label: String,
}

#[derive(Args, Debug)]
pub struct FundArgs {
    /// Account to credit
    pub address: String,

    /// Coins, e.g. `100ukiln,5uatom`
    pub coins: String,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    pub address: String,
}

pub fn cmd_address(opts: &HomeOpts, args: &AddressArgs) -> Result<()> {
    print_success(opts, json!(Address::from_label(&args.label)))
}

pub fn cmd_fund(opts: &HomeOpts, args: &FundArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let coins = parse_funds(Some(&args.coins))?;
    let ledger = LocalLedger::open(&opts.home)?;
    ledger.bank().credit(&address, &coins)?;
    let balances = ledger.bank().balances(&address)?;
    ledger.commit()?;
    print_success(opts, json!({ "address": address, "balance": balances }))
}

pub fn cmd_balance(opts: &HomeOpts, args: &BalanceArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let ledger = LocalLedger::open(&opts.home)?;
    let balances = ledger.bank().balances(&address)?;
    print_success(opts, json!({ "address": address, "balance": balances }))
}
