//! `kiln instantiate`, `kiln execute` and `kiln contract-info`.

use anyhow::{Context, Result};
use clap::Args;
use kiln_keeper::{Address, Msg, Querier, QueryRequest};
use serde_json::{Value, json};

use super::{deliver, events_value};
use crate::input::parse_input_value;
use crate::ledger::LocalLedger;
use crate::opts::{DEFAULT_GAS_LIMIT, HomeOpts, MAX_GAS_LIMIT, parse_address, parse_funds};
use crate::output::{bytes_value, print_success};

#[derive(Args, Debug)]
pub struct InstantiateArgs {
    /// Code id to instantiate
    pub code_id: u64,

    /// Init message (literal, @file or @-)
    #[arg(long, default_value = "{}")]
    pub msg: String,

    /// Creating account; also the signer of `init`
    #[arg(long)]
    pub sender: String,

    /// Deposit moved to the new contract, e.g. `100ukiln`
    #[arg(long)]
    pub funds: Option<String>,

    /// Transaction gas limit
    #[arg(
        long,
        default_value_t = DEFAULT_GAS_LIMIT,
        value_parser = clap::value_parser!(u64).range(1..=MAX_GAS_LIMIT)
    )]
    pub gas: u64,
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Contract address
    pub contract: String,

    /// Execute message (literal, @file or @-)
    #[arg(long)]
    pub msg: String,

    /// Calling account
    #[arg(long)]
    pub sender: String,

    /// Coins sent along with the call
    #[arg(long)]
    pub funds: Option<String>,

    /// Transaction gas limit
    #[arg(
        long,
        default_value_t = DEFAULT_GAS_LIMIT,
        value_parser = clap::value_parser!(u64).range(1..=MAX_GAS_LIMIT)
    )]
    pub gas: u64,
}

#[derive(Args, Debug)]
pub struct ContractInfoArgs {
    pub contract: String,
}

pub fn cmd_instantiate(opts: &HomeOpts, args: &InstantiateArgs) -> Result<()> {
    let msg = Msg::InstantiateContract {
        sender: parse_address(&args.sender)?,
        code_id: args.code_id,
        init_msg: parse_input_value(&args.msg)?,
        init_coins: parse_funds(args.funds.as_deref())?,
    };
    let (response, gas_used) = deliver(opts, &msg, args.gas)?;
    let raw: [u8; 20] = response
        .data
        .as_slice()
        .try_into()
        .context("instantiate response is not an address")?;
    print_success(
        opts,
        json!({
            "contract_address": Address::new(raw),
            "gas_used": gas_used,
            "events": events_value(&response),
        }),
    )
}

pub fn cmd_execute(opts: &HomeOpts, args: &ExecuteArgs) -> Result<()> {
    let msg = Msg::ExecuteContract {
        sender: parse_address(&args.sender)?,
        contract: parse_address(&args.contract)?,
        msg: parse_input_value(&args.msg)?,
        coins: parse_funds(args.funds.as_deref())?,
    };
    let (response, gas_used) = deliver(opts, &msg, args.gas)?;
    print_success(
        opts,
        json!({
            "data": bytes_value(&response.data),
            "gas_used": gas_used,
            "events": events_value(&response),
        }),
    )
}

pub fn cmd_contract_info(opts: &HomeOpts, args: &ContractInfoArgs) -> Result<()> {
    let ledger = LocalLedger::open(&opts.home)?;
    let ctx = ledger.context(0);
    let bytes = Querier::new(ledger.keeper()).query(
        &ctx,
        &QueryRequest::ContractInfo {
            contract_address: parse_address(&args.contract)?,
        },
    )?;
    let info: Value = serde_json::from_slice(&bytes)?;
    print_success(opts, info)
}
