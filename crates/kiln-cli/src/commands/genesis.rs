//! `kiln export` and `kiln import`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use kiln_keeper::GenesisState;
use serde_json::json;

use crate::ledger::LocalLedger;
use crate::opts::HomeOpts;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file for the canonical CBOR genesis
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Genesis file produced by `kiln export`
    pub file: PathBuf,
}

pub fn cmd_export(opts: &HomeOpts, args: &ExportArgs) -> Result<()> {
    let ledger = LocalLedger::open(&opts.home)?;
    let state = ledger.keeper().export_genesis()?;
    let bytes = kiln_cbor::to_canonical_cbor(&state).context("encode genesis")?;
    fs::write(&args.out, &bytes).with_context(|| format!("write {}", args.out.display()))?;
    print_success(opts, summary(&state, &args.out))
}

pub fn cmd_import(opts: &HomeOpts, args: &ImportArgs) -> Result<()> {
    let bytes = fs::read(&args.file).with_context(|| format!("read {}", args.file.display()))?;
    let state: GenesisState = kiln_cbor::from_cbor(&bytes).context("decode genesis")?;
    let ledger = LocalLedger::open(&opts.home)?;
    anyhow::ensure!(
        ledger.is_empty(),
        "home {} already holds ledger state",
        opts.home.display()
    );
    ledger.keeper().import_genesis(&state)?;
    ledger.commit()?;
    print_success(opts, summary(&state, &args.file))
}

fn summary(state: &GenesisState, file: &std::path::Path) -> serde_json::Value {
    json!({
        "file": file.display().to_string(),
        "codes": state.codes.len(),
        "contracts": state.contracts.len(),
        "next_code_id": state.last_code_id,
        "next_instance_id": state.last_instance_id,
    })
}
