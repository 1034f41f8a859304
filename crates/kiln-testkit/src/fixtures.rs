//! WAT contract builder for end-to-end tests against the wasmtime runtime.

use anyhow::{Result, ensure};
use kiln_wasm_abi::{ContractOutput, QueryOutput};

const OUTPUT_OFFSET: usize = 0;
const INIT_OUTPUT_OFFSET: usize = 1024;
const QUERY_OUTPUT_OFFSET: usize = 2048;
const SCRATCH_OFFSET: usize = 4096;
const MIN_HEAP_OFFSET: usize = 8192;
const PAGE_SIZE: usize = 64 * 1024;

/// Contract whose `init` and `execute` return a fixed [`ContractOutput`] and whose `query`
/// returns a fixed [`QueryOutput`]. Storage writes run, in order, before `init` and `execute`
/// return.
#[derive(Debug, Clone, Default)]
pub struct WatContract {
    output: ContractOutput,
    init_output: Option<ContractOutput>,
    query_output: QueryOutput,
    writes: Vec<(Vec<u8>, Vec<u8>)>,
    spin: bool,
}

impl WatContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, output: ContractOutput) -> Self {
        self.output = output;
        self
    }

    /// Output for `init` only; `execute` keeps returning [`WatContract::output`].
    pub fn init_output(mut self, init_output: ContractOutput) -> Self {
        self.init_output = Some(init_output);
        self
    }

    pub fn query_output(mut self, query_output: QueryOutput) -> Self {
        self.query_output = query_output;
        self
    }

    pub fn write(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.writes.push((key.into(), value.into()));
        self
    }

    /// Loop forever so every call, queries included, exhausts its gas.
    pub fn spin(mut self) -> Self {
        self.spin = true;
        self
    }

    pub fn to_wat(&self) -> Result<String> {
        let output = self.output.encode()?;
        let init_output = self.init_output.as_ref().unwrap_or(&self.output).encode()?;
        let query_output = self.query_output.encode()?;
        ensure!(
            output.len() < INIT_OUTPUT_OFFSET - OUTPUT_OFFSET,
            "contract output too large ({} bytes)",
            output.len()
        );
        ensure!(
            init_output.len() < QUERY_OUTPUT_OFFSET - INIT_OUTPUT_OFFSET,
            "init output too large ({} bytes)",
            init_output.len()
        );
        ensure!(
            query_output.len() < SCRATCH_OFFSET - QUERY_OUTPUT_OFFSET,
            "query output too large ({} bytes)",
            query_output.len()
        );

        let mut data = vec![
            data_segment(OUTPUT_OFFSET, &output),
            data_segment(INIT_OUTPUT_OFFSET, &init_output),
            data_segment(QUERY_OUTPUT_OFFSET, &query_output),
        ];
        let mut body = Vec::new();
        let mut cursor = SCRATCH_OFFSET;
        for (key, value) in &self.writes {
            let key_ptr = cursor;
            let value_ptr = key_ptr + key.len();
            cursor = value_ptr + value.len();
            data.push(data_segment(key_ptr, key));
            data.push(data_segment(value_ptr, value));
            body.push(format!(
                "(call $db_write (i32.const {key_ptr}) (i32.const {}) (i32.const {value_ptr}) (i32.const {}))",
                key.len(),
                value.len()
            ));
        }
        let spin = if self.spin { "(loop $spin (br $spin))" } else { "" };
        let heap = MIN_HEAP_OFFSET.max(cursor.next_multiple_of(8));
        ensure!(heap < PAGE_SIZE / 2, "storage writes do not fit the scratch area");

        Ok(format!(
            r#"(module
  (import "env" "db_read" (func $db_read (param i32 i32) (result i64)))
  (import "env" "db_write" (func $db_write (param i32 i32 i32 i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const {heap}))
  {data}
  (func (export "alloc") (param i32) (result i32)
    (local $old i32)
    global.get $heap
    local.tee $old
    local.get 0
    i32.add
    global.set $heap
    local.get $old)
  (func $prelude
    {body}
    {spin})
  (func (export "init") (param i32 i32) (result i32 i32)
    call $prelude
    (i32.const {INIT_OUTPUT_OFFSET})
    (i32.const {init_len}))
  (func (export "execute") (param i32 i32) (result i32 i32)
    call $prelude
    (i32.const {OUTPUT_OFFSET})
    (i32.const {output_len}))
  (func (export "query") (param i32 i32) (result i32 i32)
    {spin}
    (i32.const {QUERY_OUTPUT_OFFSET})
    (i32.const {query_len}))
)"#,
            data = data.join("\n  "),
            body = body.join("\n    "),
            output_len = output.len(),
            init_len = init_output.len(),
            query_len = query_output.len(),
        ))
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        Ok(wat::parse_str(self.to_wat()?)?)
    }
}

fn data_segment(offset: usize, bytes: &[u8]) -> String {
    let literal: String = bytes.iter().map(|b| format!("\\{b:02x}")).collect();
    format!("(data (i32.const {offset}) \"{literal}\")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_valid_module() {
        let wasm = WatContract::new()
            .write("count", "1")
            .write("owner", "alice")
            .build()
            .unwrap();
        assert!(wasm.starts_with(b"\0asm"));
    }

    #[test]
    fn writes_are_laid_out_after_scratch_offset() {
        let wat = WatContract::new().write("ab", "c").to_wat().unwrap();
        assert!(wat.contains("(data (i32.const 4096) \"\\61\\62\")"));
        assert!(wat.contains("(data (i32.const 4098) \"\\63\")"));
        assert!(wat.contains("(call $db_write (i32.const 4096) (i32.const 2) (i32.const 4098) (i32.const 1))"));
    }

    #[test]
    fn init_output_gets_its_own_segment() {
        let wat = WatContract::new()
            .output(ContractOutput::failure("execute"))
            .init_output(ContractOutput::default())
            .to_wat()
            .unwrap();
        let init = ContractOutput::default().encode().unwrap();
        assert!(wat.contains(&format!(
            "(i32.const {INIT_OUTPUT_OFFSET})\n    (i32.const {}))",
            init.len()
        )));
    }

    #[test]
    fn rejects_oversized_output() {
        let output = ContractOutput {
            data: Some(vec![0u8; 4096]),
            ..ContractOutput::default()
        };
        assert!(WatContract::new().output(output).build().is_err());
    }
}
