//! Shared scripts for integration tests.
//!
//! Each integration test compiles this module separately, so some functions may appear unused in
//! certain test contexts.

#![allow(dead_code)]

use std::sync::Arc;

use kiln_keeper::{Address, Coin};
use kiln_store::KvStore;
use kiln_testkit::{ScriptedVm, TestLedger, account};
use kiln_wasm::{VmError, VmResponse};
use kiln_wasm_abi::{Entrypoint, WireCoin, WireMessage};
use serde_json::Value;

pub const DENOM: &str = "ukiln";

pub struct Setup {
    pub vm: Arc<ScriptedVm>,
    pub ledger: TestLedger,
    pub creator: Address,
}

pub fn setup() -> Setup {
    let vm = Arc::new(ScriptedVm::new());
    let ledger = TestLedger::new(vm.clone()).unwrap();
    let creator = account("creator");
    ledger
        .fund(&creator, &[Coin::new(DENOM, 1_000)])
        .unwrap();
    Setup {
        vm,
        ledger,
        creator,
    }
}

/// `count` starts at the init msg's `start` and is incremented by every execute; queries return
/// the current value.
pub fn counter(vm: &ScriptedVm) -> Vec<u8> {
    vm.program("counter", |call| {
        let current = match call.entrypoint {
            Entrypoint::Init => {
                let init: Value = serde_json::from_slice(call.msg)
                    .map_err(|err| VmError::Contract(err.to_string()))?;
                init["start"].as_u64().unwrap_or(0)
            }
            Entrypoint::Execute | Entrypoint::Query => {
                let raw = call.storage.get(b"count")?.unwrap_or_default();
                String::from_utf8_lossy(&raw).parse().unwrap_or(0)
            }
        };
        if call.entrypoint == Entrypoint::Query {
            return Ok(VmResponse {
                data: Some(current.to_string().into_bytes()),
                ..VmResponse::default()
            });
        }
        let next = if call.entrypoint == Entrypoint::Execute {
            current + 1
        } else {
            current
        };
        call.storage.set(b"count", next.to_string().as_bytes())?;
        Ok(VmResponse {
            data: Some(next.to_string().into_bytes()),
            ..VmResponse::default()
        })
    })
}

/// Execute msg `{"pay": {"to": addr, "amount": n}}` sends `n` of its own funds; `{"steal": ...}`
/// tries to send funds owned by `from`.
pub fn payer(vm: &ScriptedVm) -> Vec<u8> {
    vm.program("payer", |call| {
        if call.entrypoint != Entrypoint::Execute {
            return Ok(VmResponse::default());
        }
        let msg: Value =
            serde_json::from_slice(call.msg).map_err(|err| VmError::Contract(err.to_string()))?;
        let message = if let Some(pay) = msg.get("pay") {
            WireMessage::transfer(
                call.contract(),
                pay["to"].as_str().unwrap_or_default(),
                vec![WireCoin::new(DENOM, pay["amount"].to_string())],
            )
        } else if let Some(steal) = msg.get("steal") {
            WireMessage::transfer(
                steal["from"].as_str().unwrap_or_default(),
                steal["to"].as_str().unwrap_or_default(),
                vec![WireCoin::new(DENOM, steal["amount"].to_string())],
            )
        } else {
            return Err(VmError::Contract("unknown msg".into()));
        };
        Ok(VmResponse {
            messages: vec![message],
            ..VmResponse::default()
        })
    })
}

/// Execute msg `{"then": [{"contract": addr, "msg": {...}}, ...]}` emits one contract call per
/// entry, in order.
pub fn relay(vm: &ScriptedVm) -> Vec<u8> {
    vm.program("relay", |call| {
        if call.entrypoint != Entrypoint::Execute {
            return Ok(VmResponse::default());
        }
        let msg: Value =
            serde_json::from_slice(call.msg).map_err(|err| VmError::Contract(err.to_string()))?;
        let messages = msg["then"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|next| {
                        WireMessage::contract_call(
                            next["contract"].as_str().unwrap_or_default(),
                            next["msg"].to_string().into_bytes(),
                            vec![],
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(VmResponse {
            messages,
            ..VmResponse::default()
        })
    })
}

/// Every execute calls itself again with the same msg.
pub fn recursive(vm: &ScriptedVm) -> Vec<u8> {
    vm.program("recursive", |call| {
        if call.entrypoint != Entrypoint::Execute {
            return Ok(VmResponse::default());
        }
        Ok(VmResponse {
            messages: vec![WireMessage::contract_call(
                call.contract(),
                call.msg.to_vec(),
                vec![],
            )],
            ..VmResponse::default()
        })
    })
}

/// Emits the JSON-encoded [`WireMessage`] it is executed with.
pub fn emitter(vm: &ScriptedVm) -> Vec<u8> {
    vm.program("emitter", |call| {
        if call.entrypoint != Entrypoint::Execute {
            return Ok(VmResponse::default());
        }
        let message: WireMessage =
            serde_json::from_slice(call.msg).map_err(|err| VmError::Contract(err.to_string()))?;
        Ok(VmResponse {
            messages: vec![message],
            ..VmResponse::default()
        })
    })
}

pub fn balance(ledger: &TestLedger, address: &Address) -> u128 {
    ledger.balance(address, DENOM).unwrap()
}
