//! Ledger gas meters and the exchange between ledger gas and VM gas.

use crate::config::KeeperConfig;
use crate::error::KeeperError;

/// Descriptor recorded when VM usage is charged to the ledger meter.
pub const WASM_GAS_DESCRIPTOR: &str = "wasm contract";
/// Descriptor recorded for the flat charge taken before each init/execute call.
pub const INSTANCE_GAS_DESCRIPTOR: &str = "loading wasm contract";

pub trait GasMeter: Send {
    fn limit(&self) -> u64;
    fn consumed(&self) -> u64;

    /// Record `amount`; fails with `OutOfGas` once consumption passes the limit. The
    /// consumption is recorded even when it fails.
    fn consume(&mut self, amount: u64, descriptor: &str) -> Result<(), KeeperError>;

    fn remaining(&self) -> u64 {
        self.limit().saturating_sub(self.consumed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicGasMeter {
    limit: u64,
    consumed: u64,
}

impl BasicGasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }
}

impl GasMeter for BasicGasMeter {
    fn limit(&self) -> u64 {
        self.limit
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }

    fn consume(&mut self, amount: u64, descriptor: &str) -> Result<(), KeeperError> {
        self.consumed = self.consumed.saturating_add(amount);
        if self.consumed > self.limit {
            return Err(KeeperError::OutOfGas {
                descriptor: descriptor.to_string(),
                limit: self.limit,
                consumed: self.consumed,
            });
        }
        Ok(())
    }
}

/// Converts between ledger gas and VM gas at a fixed rate.
///
/// Every init/execute call also costs `instance_cost` ledger gas up front, so nested calls
/// drain the ledger meter even when the contract itself burns almost no fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasBridge {
    multiplier: u64,
    max_contract_gas: u64,
    instance_cost: u64,
}

impl GasBridge {
    pub fn new(multiplier: u64, max_contract_gas: u64) -> Self {
        Self {
            multiplier: multiplier.max(1),
            max_contract_gas,
            instance_cost: 0,
        }
    }

    pub fn with_instance_cost(mut self, instance_cost: u64) -> Self {
        self.instance_cost = instance_cost;
        self
    }

    pub fn from_config(config: &KeeperConfig) -> Self {
        Self::new(config.gas_multiplier, config.max_contract_gas)
            .with_instance_cost(config.instance_cost)
    }

    /// Flat ledger charge for loading a contract before init or execute.
    pub fn charge_instance(&self, meter: &mut dyn GasMeter) -> Result<(), KeeperError> {
        meter.consume(self.instance_cost, INSTANCE_GAS_DESCRIPTOR)
    }

    /// VM budget for one call: remaining ledger gas at the exchange rate, capped per call.
    pub fn call_budget(&self, remaining_ledger_gas: u64) -> u64 {
        remaining_ledger_gas
            .saturating_mul(self.multiplier)
            .min(self.max_contract_gas)
    }

    /// Charge `vm_gas_used` (rounded down to ledger units) to `meter`.
    pub fn reconcile(&self, meter: &mut dyn GasMeter, vm_gas_used: u64) -> Result<(), KeeperError> {
        let ledger_gas = vm_gas_used / self.multiplier;
        log::debug!("reconcile {vm_gas_used} vm gas as {ledger_gas} ledger gas");
        meter.consume(ledger_gas, WASM_GAS_DESCRIPTOR)
    }

    /// Budget derived from whatever `meter` has left.
    pub fn budget_for(&self, meter: &dyn GasMeter) -> u64 {
        self.call_budget(meter.remaining())
    }
}
