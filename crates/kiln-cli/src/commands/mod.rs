pub mod account;
pub mod code;
pub mod contract;
pub mod genesis;
pub mod query;

use anyhow::{Context as _, Result};
use kiln_keeper::{Handler, HandlerResponse, Msg};
use serde_json::{Value, json};

use crate::ledger::LocalLedger;
use crate::opts::HomeOpts;

/// Apply `msg` in a new block and persist the result only if it succeeds.
fn deliver(opts: &HomeOpts, msg: &Msg, gas_limit: u64) -> Result<(HandlerResponse, u64)> {
    let ledger = LocalLedger::open(&opts.home)?;
    let mut ctx = ledger.context(gas_limit);
    let response = Handler::new(ledger.keeper())
        .handle(&mut ctx, msg)
        .with_context(|| format!("{} failed", msg.kind()))?;
    let gas_used = ctx.gas_consumed();
    ledger.commit()?;
    tracing::info!(kind = msg.kind(), gas_used, "committed block");
    Ok((response, gas_used))
}

fn events_value(response: &HandlerResponse) -> Value {
    Value::Array(
        response
            .events
            .iter()
            .map(|event| {
                let attributes: serde_json::Map<String, Value> = event
                    .attributes
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect();
                json!({ "type": event.kind, "attributes": attributes })
            })
            .collect(),
    )
}
