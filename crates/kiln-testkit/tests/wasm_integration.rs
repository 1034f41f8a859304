//! End-to-end runs through the wasmtime runtime with WAT-built contracts.

use kiln_keeper::{Address, Coin, KeeperError};
use kiln_testkit::ledger::DEFAULT_TX_GAS_LIMIT;
use kiln_testkit::{TestLedger, WatContract, account};
use kiln_wasm::VmError;
use kiln_wasm_abi::{ContractOutput, QueryOutput, WireCoin, WireMessage};

const DENOM: &str = "ukiln";

/// Every init/execute writes `count` and pays 40 of the contract's own funds to bob.
fn paying_contract(contract: &Address, bob: &Address) -> Vec<u8> {
    WatContract::new()
        .output(ContractOutput {
            data: Some(b"paid".to_vec()),
            messages: vec![WireMessage::transfer(
                contract.to_string(),
                bob.to_string(),
                vec![WireCoin::new(DENOM, "40")],
            )],
            error: None,
        })
        .query_output(QueryOutput {
            data: br#"{"count":1}"#.to_vec(),
            error: None,
        })
        .write("count", "1")
        .build()
        .unwrap()
}

#[test]
fn wasm_contract_pays_out_until_empty() {
    let ledger = TestLedger::with_wasmtime().unwrap();
    let creator = account("creator");
    let bob = account("bob");
    ledger.fund(&creator, &[Coin::new(DENOM, 100)]).unwrap();

    let expected = Address::for_contract(1, 1);
    let wasm = paying_contract(&expected, &bob);
    let code_id = ledger.store_code(&creator, &wasm).unwrap();
    assert_eq!(code_id, 1);
    assert_eq!(ledger.keeper().get_bytecode(code_id).unwrap(), wasm);

    let contract = ledger
        .instantiate(&creator, code_id, b"{}", &[Coin::new(DENOM, 100)])
        .unwrap();
    assert_eq!(contract, expected);
    assert_eq!(ledger.balance(&bob, DENOM).unwrap(), 40);
    assert_eq!(ledger.balance(&contract, DENOM).unwrap(), 60);
    assert_eq!(
        ledger.keeper().read_raw_store_key(&contract, b"count").unwrap(),
        Some(b"1".to_vec())
    );
    assert!(ledger.last_gas_used() > 0);

    let data = ledger.execute(&contract, &creator, &[], b"{}").unwrap();
    assert_eq!(data, Some(b"paid".to_vec()));
    assert_eq!(ledger.balance(&bob, DENOM).unwrap(), 80);
    assert_eq!(ledger.balance(&contract, DENOM).unwrap(), 20);

    let err = ledger.execute(&contract, &creator, &[], b"{}").unwrap_err();
    assert!(matches!(err, KeeperError::Bank(_)), "got {err:?}");
    assert_eq!(ledger.balance(&contract, DENOM).unwrap(), 20);

    assert_eq!(ledger.query(&contract, b"{}").unwrap(), br#"{"count":1}"#);
}

#[test]
fn wasm_runaway_init_fails_out_of_gas_and_rolls_back() {
    let mut ledger = TestLedger::with_wasmtime().unwrap();
    ledger.set_gas_limit(50_000);
    let creator = account("creator");
    ledger.fund(&creator, &[Coin::new(DENOM, 10)]).unwrap();
    let code_id = ledger
        .store_code(&creator, &WatContract::new().spin().build().unwrap())
        .unwrap();

    let err = ledger
        .instantiate(&creator, code_id, b"{}", &[Coin::new(DENOM, 10)])
        .unwrap_err();
    assert!(
        matches!(err, KeeperError::InstantiateFailed(VmError::OutOfGas { .. })),
        "got {err:?}"
    );
    assert_eq!(ledger.balance(&creator, DENOM).unwrap(), 10);
    assert!(ledger.keeper().contract_records().unwrap().is_empty());
}

/// `execute` burns only a handful of fuel and calls itself again; the instance cost charged per
/// call ends the chain with an error instead of exhausting the native stack.
#[test]
fn wasm_self_call_is_bounded_by_instance_cost() {
    let ledger = TestLedger::with_wasmtime().unwrap();
    let creator = account("creator");
    let contract = Address::for_contract(1, 1);
    let wasm = WatContract::new()
        .init_output(ContractOutput::default())
        .output(ContractOutput::with_messages(vec![WireMessage::contract_call(
            contract.to_string(),
            b"{}".to_vec(),
            vec![],
        )]))
        .write("calls", "1")
        .build()
        .unwrap();
    let code_id = ledger.store_code(&creator, &wasm).unwrap();
    assert_eq!(
        ledger.instantiate(&creator, code_id, b"{}", &[]).unwrap(),
        contract
    );
    let before = ledger.kv().entries();

    let err = ledger.execute(&contract, &creator, &[], b"{}").unwrap_err();
    assert!(matches!(err, KeeperError::OutOfGas { .. }), "got {err:?}");
    assert!(ledger.last_gas_used() > DEFAULT_TX_GAS_LIMIT);
    assert_eq!(ledger.kv().entries(), before);
}

#[test]
fn wasm_contract_error_fails_instantiate() {
    let ledger = TestLedger::with_wasmtime().unwrap();
    let creator = account("creator");
    let wasm = WatContract::new()
        .output(ContractOutput::failure("bad init"))
        .build()
        .unwrap();
    let code_id = ledger.store_code(&creator, &wasm).unwrap();
    match ledger.instantiate(&creator, code_id, b"{}", &[]) {
        Err(KeeperError::InstantiateFailed(VmError::Contract(reason))) => {
            assert_eq!(reason, "bad init")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn non_wasm_upload_is_rejected() {
    let ledger = TestLedger::with_wasmtime().unwrap();
    let err = ledger
        .store_code(&account("creator"), b"definitely not wasm")
        .unwrap_err();
    assert!(matches!(err, KeeperError::CreateFailed(_)), "got {err:?}");
    assert_eq!(ledger.keeper().next_code_id().unwrap(), 1);
}
