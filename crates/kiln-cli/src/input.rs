//! Input parsing utilities for @file and @- syntax.

use std::io::Read;

use anyhow::{Context, Result};

/// Parse an input value that may be a literal, @file, or @- for stdin.
///
/// - `@-` reads from stdin
/// - `@path` reads from the specified file
/// - Otherwise, returns the literal's bytes
pub fn parse_input_value(value: &str) -> Result<Vec<u8>> {
    if value == "@-" {
        read_stdin()
    } else if let Some(path) = value.strip_prefix('@') {
        std::fs::read(path).with_context(|| format!("failed to read file: {path}"))
    } else {
        Ok(value.as_bytes().to_vec())
    }
}

/// Parse input as raw bytes; literal data is rejected.
pub fn parse_input_bytes(value: &str) -> Result<Vec<u8>> {
    if value == "@-" {
        read_stdin()
    } else if let Some(path) = value.strip_prefix('@') {
        std::fs::read(path).with_context(|| format!("failed to read file: {path}"))
    } else {
        anyhow::bail!("expected @file or @- for binary input, not literal data")
    }
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("failed to read from stdin")?;
    Ok(buf)
}
