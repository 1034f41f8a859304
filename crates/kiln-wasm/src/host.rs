//! Host imports (`env` module) exposing the contract's private storage region.

use std::ops::Range;

use anyhow::{Context, Result};
use kiln_store::DynKv;
use wasmtime::{Caller, Extern, Linker, Memory, Trap};

use crate::{ALLOC_EXPORT, MEMORY_EXPORT};

const HOST_MODULE: &str = "env";

/// Fuel charged for storage host calls, in VM gas units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGasCosts {
    pub read_flat: u64,
    pub read_per_byte: u64,
    pub write_flat: u64,
    pub write_per_byte: u64,
    pub remove_flat: u64,
}

impl Default for HostGasCosts {
    fn default() -> Self {
        Self {
            read_flat: 100,
            read_per_byte: 1,
            write_flat: 200,
            write_per_byte: 5,
            remove_flat: 100,
        }
    }
}

pub(crate) struct HostState {
    storage: DynKv,
    costs: HostGasCosts,
}

impl HostState {
    pub(crate) fn new(storage: DynKv, costs: HostGasCosts) -> Self {
        Self { storage, costs }
    }
}

pub(crate) fn add_host_imports(linker: &mut Linker<HostState>) -> Result<()> {
    // Returns `(ptr << 32) | len` of a guest allocation holding the value, or -1 when absent.
    linker.func_wrap(
        HOST_MODULE,
        "db_read",
        |mut caller: Caller<'_, HostState>, key_ptr: i32, key_len: i32| -> Result<i64> {
            let costs = caller.data().costs.clone();
            let cost = costs
                .read_flat
                .saturating_add(per_byte(costs.read_per_byte, guest_len(key_len)?));
            charge(&mut caller, cost)?;
            let key = read_guest(&mut caller, key_ptr, key_len)?;
            let Some(value) = caller.data().storage.get(&key)? else {
                return Ok(-1);
            };
            charge(&mut caller, per_byte(costs.read_per_byte, value.len()))?;
            let ptr = write_guest(&mut caller, &value)?;
            Ok(pack(ptr, value.len()))
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "db_write",
        |mut caller: Caller<'_, HostState>,
         key_ptr: i32,
         key_len: i32,
         value_ptr: i32,
         value_len: i32|
         -> Result<()> {
            let costs = caller.data().costs.clone();
            let len = guest_len(key_len)?.saturating_add(guest_len(value_len)?);
            charge(
                &mut caller,
                costs
                    .write_flat
                    .saturating_add(per_byte(costs.write_per_byte, len)),
            )?;
            let key = read_guest(&mut caller, key_ptr, key_len)?;
            let value = read_guest(&mut caller, value_ptr, value_len)?;
            caller.data().storage.set(&key, &value)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "db_remove",
        |mut caller: Caller<'_, HostState>, key_ptr: i32, key_len: i32| -> Result<()> {
            let cost = caller.data().costs.remove_flat;
            charge(&mut caller, cost)?;
            let key = read_guest(&mut caller, key_ptr, key_len)?;
            caller.data().storage.remove(&key)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "debug",
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> Result<()> {
            let bytes = read_guest(&mut caller, ptr, len)?;
            log::debug!("contract: {}", String::from_utf8_lossy(&bytes));
            Ok(())
        },
    )?;

    Ok(())
}

fn per_byte(rate: u64, len: usize) -> u64 {
    rate.saturating_mul(len as u64)
}

fn pack(ptr: i32, len: usize) -> i64 {
    (((ptr as u32) as i64) << 32) | ((len as u32) as i64)
}

fn charge(caller: &mut Caller<'_, HostState>, cost: u64) -> Result<()> {
    let remaining = caller.get_fuel()?;
    if remaining < cost {
        caller.set_fuel(0)?;
        return Err(Trap::OutOfFuel.into());
    }
    caller.set_fuel(remaining - cost)?;
    Ok(())
}

fn guest_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory> {
    caller
        .get_export(MEMORY_EXPORT)
        .and_then(Extern::into_memory)
        .context("wasm export 'memory' not found")
}

fn guest_len(len: i32) -> Result<usize> {
    usize::try_from(len).context("negative guest length")
}

/// Byte range `ptr..ptr + len`, rejected unless it lies inside a memory of `memory_size` bytes.
pub(crate) fn guest_range(memory_size: usize, ptr: i32, len: i32) -> Result<Range<usize>> {
    let start = usize::try_from(ptr).context("negative guest pointer")?;
    let end = start
        .checked_add(guest_len(len)?)
        .filter(|end| *end <= memory_size)
        .with_context(|| format!("guest range {start}+{len} exceeds memory of {memory_size} bytes"))?;
    Ok(start..end)
}

fn read_guest(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Result<Vec<u8>> {
    let memory = guest_memory(caller)?;
    let range = guest_range(memory.data_size(&*caller), ptr, len)?;
    Ok(memory.data(&*caller)[range].to_vec())
}

fn write_guest(caller: &mut Caller<'_, HostState>, bytes: &[u8]) -> Result<i32> {
    let memory = guest_memory(caller)?;
    let alloc = caller
        .get_export(ALLOC_EXPORT)
        .and_then(Extern::into_func)
        .context("wasm export 'alloc' not found")?
        .typed::<i32, i32>(&*caller)?;
    let len = i32::try_from(bytes.len()).context("value too large for wasm32")?;
    let ptr = alloc.call(&mut *caller, len)?;
    let offset = usize::try_from(ptr).context("negative guest pointer")?;
    memory.write(&mut *caller, offset, bytes)?;
    Ok(ptr)
}
