use std::fs;
use std::path::Path;

use assert_cmd::prelude::*;
use kiln_keeper::Address;
use kiln_testkit::WatContract;
use kiln_wasm_abi::{ContractOutput, QueryOutput, WireCoin, WireMessage};
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn kiln(home: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("kiln"));
    cmd.env_remove("KILN_HOME")
        .args(["--home", home.to_str().unwrap(), "--json"]);
    cmd
}

fn run(home: &Path, args: &[&str]) -> Value {
    let assert = kiln(home).args(args).assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: Value = serde_json::from_str(&output).expect("json");
    json["data"].clone()
}

fn amount(balance: &Value, denom: &str) -> u64 {
    balance["balance"]
        .as_array()
        .unwrap()
        .iter()
        .find(|coin| coin["denom"] == denom)
        .and_then(|coin| coin["amount"].as_u64())
        .unwrap_or(0)
}

/// Pays 40ukiln from the first contract instance to `bob` on every init and execute.
fn write_paying_contract(dir: &Path, bob: &str) -> String {
    let contract = Address::for_contract(1, 1);
    let wasm = WatContract::new()
        .output(ContractOutput {
            data: Some(b"paid".to_vec()),
            messages: vec![WireMessage::transfer(
                contract.to_string(),
                bob.to_string(),
                vec![WireCoin::new("ukiln", "40")],
            )],
            error: None,
        })
        .query_output(QueryOutput {
            data: br#"{"count":1}"#.to_vec(),
            error: None,
        })
        .write("count", "1")
        .build()
        .unwrap();
    let path = dir.join("paying.wasm");
    fs::write(&path, wasm).unwrap();
    format!("@{}", path.display())
}

/// Stores and instantiates the paying contract with a 100ukiln deposit.
fn deploy(home: &Path, work: &Path) -> (String, String, String) {
    let alice = run(home, &["address", "alice"]).as_str().unwrap().to_string();
    let bob = run(home, &["address", "bob"]).as_str().unwrap().to_string();
    run(home, &["fund", &alice, "100ukiln"]);

    let wasm = write_paying_contract(work, &bob);
    let stored = run(home, &["store", &wasm, "--sender", &alice]);
    assert_eq!(stored["code_id"], json!(1));

    let created = run(
        home,
        &["instantiate", "1", "--sender", &alice, "--funds", "100ukiln"],
    );
    assert!(created["gas_used"].as_u64().unwrap() > 0);
    let contract = created["contract_address"].as_str().unwrap().to_string();
    (alice, bob, contract)
}

#[test]
fn help_lists_commands() {
    std::process::Command::new(assert_cmd::cargo::cargo_bin!("kiln"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("instantiate")
                .and(predicate::str::contains("query-raw"))
                .and(predicate::str::contains("export")),
        );
}

#[test]
fn fund_and_balance_persist_between_runs() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let alice = run(&home, &["address", "alice"]);
    assert_eq!(alice, json!(Address::from_label("alice")));
    let alice = alice.as_str().unwrap();

    let funded = run(&home, &["fund", alice, "100ukiln,5uatom"]);
    assert_eq!(amount(&funded, "ukiln"), 100);
    run(&home, &["fund", alice, "1ukiln"]);

    let balance = run(&home, &["balance", alice]);
    assert_eq!(amount(&balance, "ukiln"), 101);
    assert_eq!(amount(&balance, "uatom"), 5);
}

#[test]
fn deploy_execute_and_query_contract() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let (alice, bob, contract) = deploy(&home, tmp.path());
    assert_eq!(contract, Address::for_contract(1, 1).to_string());

    assert_eq!(amount(&run(&home, &["balance", &bob]), "ukiln"), 40);
    assert_eq!(amount(&run(&home, &["balance", &contract]), "ukiln"), 60);

    let executed = run(
        &home,
        &["execute", &contract, "--msg", "{}", "--sender", &alice],
    );
    assert_eq!(executed["data"], json!("paid"));
    assert!(
        executed["events"]
            .as_array()
            .unwrap()
            .iter()
            .any(|event| event["attributes"]["contract_address"] == json!(contract))
    );
    assert_eq!(amount(&run(&home, &["balance", &bob]), "ukiln"), 80);

    assert_eq!(run(&home, &["query", &contract]), json!({"count": 1}));
    assert_eq!(run(&home, &["query-raw", &contract, "count"]), json!(1));
    assert_eq!(
        run(&home, &["query-raw", &contract, "--hex", "636f756e74"]),
        json!(1)
    );
    assert_eq!(run(&home, &["query-raw", &contract, "missing"]), Value::Null);

    let info = run(&home, &["contract-info", &contract]);
    assert_eq!(info["code_id"], json!(1));
    assert_eq!(info["creator"], json!(alice));

    let code = run(&home, &["code-info", "1"]);
    assert_eq!(code["creator"], json!(alice));
}

#[test]
fn failed_execute_leaves_home_unchanged() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let (alice, _bob, contract) = deploy(&home, tmp.path());
    run(&home, &["execute", &contract, "--msg", "{}", "--sender", &alice]);
    let state = fs::read(home.join("state.cbor")).unwrap();

    // Only 20ukiln left, so the 40ukiln payout fails.
    kiln(&home)
        .args(["execute", &contract, "--msg", "{}", "--sender", &alice])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed"));

    assert_eq!(fs::read(home.join("state.cbor")).unwrap(), state);
    assert_eq!(amount(&run(&home, &["balance", &contract]), "ukiln"), 20);
}

#[test]
fn gas_limit_above_cap_is_rejected() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let alice = run(&home, &["address", "alice"]);
    kiln(&home)
        .args([
            "instantiate",
            "1",
            "--sender",
            alice.as_str().unwrap(),
            "--gas",
            "1000000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--gas"));
    assert!(!home.join("state.cbor").exists());
}

#[test]
fn unknown_code_id_is_rejected() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let alice = run(&home, &["address", "alice"]);
    kiln(&home)
        .args(["instantiate", "7", "--sender", alice.as_str().unwrap()])
        .assert()
        .failure();
    assert!(!home.join("state.cbor").exists());
}

#[test]
fn export_then_import_into_fresh_home() {
    let tmp = TempDir::new().expect("tmpdir");
    let home = tmp.path().join("home");
    let (alice, _bob, contract) = deploy(&home, tmp.path());

    let genesis = tmp.path().join("genesis.cbor");
    let exported = run(&home, &["export", "--out", genesis.to_str().unwrap()]);
    assert_eq!(exported["codes"], json!(1));
    assert_eq!(exported["contracts"], json!(1));

    let fresh = tmp.path().join("fresh");
    let imported = run(&fresh, &["import", genesis.to_str().unwrap()]);
    assert_eq!(imported["contracts"], json!(1));

    let info = run(&fresh, &["contract-info", &contract]);
    assert_eq!(info["creator"], json!(alice));
    assert_eq!(run(&fresh, &["query-raw", &contract, "count"]), json!(1));
    assert_eq!(run(&fresh, &["query", &contract]), json!({"count": 1}));

    kiln(&fresh)
        .args(["import", genesis.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already holds"));
}
