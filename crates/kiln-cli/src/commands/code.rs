//! `kiln store` and `kiln code-info`.

use anyhow::{Context, Result};
use clap::Args;
use kiln_keeper::{Msg, Querier, QueryRequest};
use serde_json::{Value, json};

use super::{deliver, events_value};
use crate::input::parse_input_bytes;
use crate::ledger::LocalLedger;
use crate::opts::{DEFAULT_GAS_LIMIT, HomeOpts, MAX_GAS_LIMIT, parse_address};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Bytecode file (@file or @- for stdin)
    pub wasm: String,

    /// Uploading account
    #[arg(long)]
    pub sender: String,

    /// Transaction gas limit
    #[arg(
        long,
        default_value_t = DEFAULT_GAS_LIMIT,
        value_parser = clap::value_parser!(u64).range(1..=MAX_GAS_LIMIT)
    )]
    pub gas: u64,
}

#[derive(Args, Debug)]
pub struct CodeInfoArgs {
    pub code_id: u64,
}

pub fn cmd_store(opts: &HomeOpts, args: &StoreArgs) -> Result<()> {
    let msg = Msg::StoreCode {
        sender: parse_address(&args.sender)?,
        wasm_byte_code: parse_input_bytes(&args.wasm)?,
    };
    let (response, gas_used) = deliver(opts, &msg, args.gas)?;
    let code_id = u64::from_be_bytes(
        response
            .data
            .as_slice()
            .try_into()
            .context("store response is not a code id")?,
    );
    print_success(
        opts,
        json!({ "code_id": code_id, "gas_used": gas_used, "events": events_value(&response) }),
    )
}

pub fn cmd_code_info(opts: &HomeOpts, args: &CodeInfoArgs) -> Result<()> {
    let ledger = LocalLedger::open(&opts.home)?;
    let ctx = ledger.context(0);
    let bytes = Querier::new(ledger.keeper()).query(
        &ctx,
        &QueryRequest::CodeInfo {
            code_id: args.code_id,
        },
    )?;
    let info: Value = serde_json::from_slice(&bytes)?;
    print_success(opts, info)
}
