use kiln_wasm_abi::BlockInfo;

use crate::gas::{BasicGasMeter, GasMeter};

/// State-transition context: the block being built and the transaction's gas meter.
pub struct Context {
    pub block: BlockInfo,
    pub gas_meter: Box<dyn GasMeter>,
}

impl Context {
    pub fn new(block: BlockInfo, gas_limit: u64) -> Self {
        Self::with_gas_meter(block, Box::new(BasicGasMeter::new(gas_limit)))
    }

    pub fn with_gas_meter(block: BlockInfo, gas_meter: Box<dyn GasMeter>) -> Self {
        Self { block, gas_meter }
    }

    pub fn gas_consumed(&self) -> u64 {
        self.gas_meter.consumed()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("block", &self.block)
            .field("gas_limit", &self.gas_meter.limit())
            .field("gas_consumed", &self.gas_meter.consumed())
            .finish()
    }
}
