//! Shared output helpers for human and JSON modes.
//!
//! Human mode prints primary data to stdout. JSON mode wraps responses in `{ data }` and
//! respects `--pretty`.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::opts::HomeOpts;

pub fn print_success(opts: &HomeOpts, data: Value) -> Result<()> {
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(&json!({ "data": data }))?);
    } else if opts.json {
        println!("{}", serde_json::to_string(&json!({ "data": data }))?);
    } else {
        match data {
            Value::String(s) => println!("{s}"),
            other => println!("{}", serde_json::to_string_pretty(&other)?),
        }
    }
    Ok(())
}

/// Contract payloads as JSON: parsed when they are JSON, text when UTF-8, else base64.
pub fn bytes_value(bytes: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        return value;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => json!({ "base64": BASE64.encode(bytes) }),
    }
}
