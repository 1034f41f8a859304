//! Global CLI options.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use kiln_keeper::{Address, Coin, parse_coins};

/// Per-transaction gas limit used when `--gas` is not given.
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Upper bound accepted for `--gas`; with the default instance cost this keeps nested contract
/// calls a few hundred frames deep.
pub const MAX_GAS_LIMIT: u64 = 20_000_000;

/// Global options for CLI commands.
#[derive(Args, Debug, Clone)]
pub struct HomeOpts {
    /// Ledger home directory holding state, blobs and module cache (env: KILN_HOME)
    #[arg(long, global = true, env = "KILN_HOME", default_value = ".kiln")]
    pub home: PathBuf,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::parse(value).with_context(|| format!("invalid address '{value}'"))
}

/// Coins in `100ukiln,5uatom` form; an absent value is no coins.
pub fn parse_funds(value: Option<&str>) -> Result<Vec<Coin>> {
    let Some(text) = value else {
        return Ok(Vec::new());
    };
    parse_coins(text).with_context(|| format!("invalid coins '{text}'"))
}
