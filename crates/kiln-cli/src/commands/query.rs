//! `kiln query` and `kiln query-raw`.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Args;
use kiln_keeper::{Querier, QueryRequest};
use serde_json::Value;

use crate::input::parse_input_value;
use crate::ledger::LocalLedger;
use crate::opts::{HomeOpts, parse_address};
use crate::output::{bytes_value, print_success};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Contract address
    pub contract: String,

    /// Query message (literal, @file or @-)
    #[arg(long, default_value = "{}")]
    pub msg: String,
}

#[derive(Args, Debug)]
pub struct QueryRawArgs {
    /// Contract address
    pub contract: String,

    /// Store key, as text unless --hex is given
    pub key: String,

    /// Interpret the key as hex
    #[arg(long)]
    pub hex: bool,
}

pub fn cmd_query(opts: &HomeOpts, args: &QueryArgs) -> Result<()> {
    let ledger = LocalLedger::open(&opts.home)?;
    let ctx = ledger.context(0);
    let data = Querier::new(ledger.keeper()).query(
        &ctx,
        &QueryRequest::Msg {
            contract_address: parse_address(&args.contract)?,
            msg: parse_input_value(&args.msg)?,
        },
    )?;
    print_success(opts, bytes_value(&data))
}

pub fn cmd_query_raw(opts: &HomeOpts, args: &QueryRawArgs) -> Result<()> {
    let key = if args.hex {
        hex::decode(&args.key).with_context(|| format!("invalid hex key '{}'", args.key))?
    } else {
        args.key.as_bytes().to_vec()
    };
    let ledger = LocalLedger::open(&opts.home)?;
    let ctx = ledger.context(0);
    let bytes = Querier::new(ledger.keeper()).query(
        &ctx,
        &QueryRequest::Store {
            contract_address: parse_address(&args.contract)?,
            key,
        },
    )?;
    let value: Option<String> = serde_json::from_slice(&bytes)?;
    let value = match value {
        Some(encoded) => bytes_value(&BASE64.decode(encoded).context("decode store value")?),
        None => Value::Null,
    };
    print_success(opts, value)
}
