//! Keeper parameters: gas exchange rate, per-call ceilings and upload limits.

use serde::{Deserialize, Serialize};

use crate::error::KeeperError;

pub const DEFAULT_GAS_MULTIPLIER: u64 = 100;
pub const DEFAULT_MAX_CONTRACT_GAS: u64 = 900_000_000;
pub const DEFAULT_QUERY_GAS_LIMIT: u64 = 3_000_000;
pub const DEFAULT_INSTANCE_COST: u64 = 40_000;
pub const DEFAULT_MAX_CONTRACT_SIZE: usize = 500 * 1024;
pub const DEFAULT_MAX_CONTRACT_MSG_SIZE: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// VM gas units per ledger gas unit.
    pub gas_multiplier: u64,
    /// Ceiling for a single VM invocation, in VM gas units.
    pub max_contract_gas: u64,
    /// Ledger gas granted to each read-only query.
    pub query_gas_limit: u64,
    /// Ledger gas charged before every init/execute invocation. A transaction's gas limit
    /// divided by this bounds how deep contracts can call each other.
    pub instance_cost: u64,
    /// Maximum bytecode size in bytes, after decompression.
    pub max_contract_size: usize,
    /// Maximum init/execute/query payload size in bytes.
    pub max_contract_msg_size: usize,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            gas_multiplier: DEFAULT_GAS_MULTIPLIER,
            max_contract_gas: DEFAULT_MAX_CONTRACT_GAS,
            query_gas_limit: DEFAULT_QUERY_GAS_LIMIT,
            instance_cost: DEFAULT_INSTANCE_COST,
            max_contract_size: DEFAULT_MAX_CONTRACT_SIZE,
            max_contract_msg_size: DEFAULT_MAX_CONTRACT_MSG_SIZE,
        }
    }
}

impl KeeperConfig {
    /// Defaults overridden by `KILN_*` environment variables.
    pub fn from_env() -> Result<Self, KeeperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, KeeperError> {
        let mut config = Self::default();
        if let Some(value) = parse_var(&lookup, "KILN_GAS_MULTIPLIER")? {
            config.gas_multiplier = value;
        }
        if let Some(value) = parse_var(&lookup, "KILN_MAX_CONTRACT_GAS")? {
            config.max_contract_gas = value;
        }
        if let Some(value) = parse_var(&lookup, "KILN_QUERY_GAS_LIMIT")? {
            config.query_gas_limit = value;
        }
        if let Some(value) = parse_var(&lookup, "KILN_INSTANCE_COST")? {
            config.instance_cost = value;
        }
        if let Some(value) = parse_var(&lookup, "KILN_MAX_CONTRACT_SIZE")? {
            config.max_contract_size = value;
        }
        if let Some(value) = parse_var(&lookup, "KILN_MAX_CONTRACT_MSG_SIZE")? {
            config.max_contract_msg_size = value;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KeeperError> {
        if self.gas_multiplier == 0 {
            return Err(KeeperError::InvalidConfig(
                "gas_multiplier must be positive".into(),
            ));
        }
        if self.max_contract_gas == 0 || self.query_gas_limit == 0 {
            return Err(KeeperError::InvalidConfig(
                "gas ceilings must be positive".into(),
            ));
        }
        if self.instance_cost == 0 {
            return Err(KeeperError::InvalidConfig(
                "instance_cost must be positive".into(),
            ));
        }
        if self.max_contract_size == 0 || self.max_contract_msg_size == 0 {
            return Err(KeeperError::InvalidConfig(
                "size limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, KeeperError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KeeperError::InvalidConfig(format!("{key}: cannot parse '{raw}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = KeeperConfig::from_lookup(lookup(&[
            ("KILN_GAS_MULTIPLIER", "50"),
            ("KILN_QUERY_GAS_LIMIT", " 1000 "),
        ]))
        .unwrap();
        assert_eq!(config.gas_multiplier, 50);
        assert_eq!(config.query_gas_limit, 1000);
        assert_eq!(config.max_contract_gas, DEFAULT_MAX_CONTRACT_GAS);
    }

    #[test]
    fn rejects_unparsable_and_zero_values() {
        let err = KeeperConfig::from_lookup(lookup(&[("KILN_MAX_CONTRACT_GAS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, KeeperError::InvalidConfig(msg) if msg.contains("KILN_MAX_CONTRACT_GAS")));

        let err = KeeperConfig::from_lookup(lookup(&[("KILN_GAS_MULTIPLIER", "0")])).unwrap_err();
        assert!(matches!(err, KeeperError::InvalidConfig(_)));

        let err = KeeperConfig::from_lookup(lookup(&[("KILN_INSTANCE_COST", "0")])).unwrap_err();
        assert!(matches!(err, KeeperError::InvalidConfig(msg) if msg.contains("instance_cost")));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: KeeperConfig = serde_json::from_str(r#"{"max_contract_size": 1024}"#).unwrap();
        assert_eq!(config.max_contract_size, 1024);
        assert_eq!(config.gas_multiplier, DEFAULT_GAS_MULTIPLIER);
    }
}
