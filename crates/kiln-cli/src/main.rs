mod commands;
mod input;
mod ledger;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::account::{AddressArgs, BalanceArgs, FundArgs};
use commands::code::{CodeInfoArgs, StoreArgs};
use commands::contract::{ContractInfoArgs, ExecuteArgs, InstantiateArgs};
use commands::genesis::{ExportArgs, ImportArgs};
use commands::query::{QueryArgs, QueryRawArgs};
use opts::HomeOpts;

#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Local wasm contract ledger")]
struct Cli {
    #[command(flatten)]
    opts: HomeOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the account address for a label
    Address(AddressArgs),

    /// Credit coins to an account
    Fund(FundArgs),

    /// Show an account's balances
    Balance(BalanceArgs),

    /// Upload contract bytecode (plain or gzip)
    Store(StoreArgs),

    /// Create a contract instance from stored code
    Instantiate(InstantiateArgs),

    /// Execute a contract
    Execute(ExecuteArgs),

    /// Smart query through the contract's query entrypoint
    Query(QueryArgs),

    /// Read a raw key from a contract's store
    QueryRaw(QueryRawArgs),

    /// Show a code record
    CodeInfo(CodeInfoArgs),

    /// Show a contract record
    ContractInfo(ContractInfoArgs),

    /// Export codes, contracts and counters to a CBOR file
    Export(ExportArgs),

    /// Import a genesis file into an empty home
    Import(ImportArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let opts = &cli.opts;

    match cli.command {
        Command::Address(args) => commands::account::cmd_address(opts, &args),
        Command::Fund(args) => commands::account::cmd_fund(opts, &args),
        Command::Balance(args) => commands::account::cmd_balance(opts, &args),
        Command::Store(args) => commands::code::cmd_store(opts, &args),
        Command::Instantiate(args) => commands::contract::cmd_instantiate(opts, &args),
        Command::Execute(args) => commands::contract::cmd_execute(opts, &args),
        Command::Query(args) => commands::query::cmd_query(opts, &args),
        Command::QueryRaw(args) => commands::query::cmd_query_raw(opts, &args),
        Command::CodeInfo(args) => commands::code::cmd_code_info(opts, &args),
        Command::ContractInfo(args) => commands::contract::cmd_contract_info(opts, &args),
        Command::Export(args) => commands::genesis::cmd_export(opts, &args),
        Command::Import(args) => commands::genesis::cmd_import(opts, &args),
    }
}

/// `RUST_LOG` overrides the default `warn` filter; `log` records from the libraries are captured.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
