//! Native coins and conversion from the decimal-string wire form.

use std::fmt;
use std::str::FromStr;

use kiln_wasm_abi::WireCoin;
use serde::{Deserialize, Serialize};

use crate::error::KeeperError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Validated conversion from the wire form; the amount must be an unsigned decimal.
    pub fn from_wire(wire: &WireCoin) -> Result<Self, KeeperError> {
        validate_denom(&wire.denom)?;
        let amount = parse_amount(&wire.amount)
            .ok_or_else(|| KeeperError::InvalidCoins(format!("failed to parse {}", wire.amount)))?;
        Ok(Coin::new(wire.denom.clone(), amount))
    }

    pub fn to_wire(&self) -> WireCoin {
        WireCoin::new(self.denom.clone(), self.amount.to_string())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Parses `<amount><denom>`, e.g. `100ukiln`.
impl FromStr for Coin {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| KeeperError::InvalidCoins(format!("missing denom in '{s}'")))?;
        let (amount, denom) = s.split_at(split);
        Coin::from_wire(&WireCoin::new(denom, amount))
    }
}

fn parse_amount(raw: &str) -> Option<u128> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub fn validate_denom(denom: &str) -> Result<(), KeeperError> {
    let valid_len = (2..=64).contains(&denom.len());
    let starts_lower = denom.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_chars = denom
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/');
    if valid_len && starts_lower && valid_chars {
        Ok(())
    } else {
        Err(KeeperError::InvalidCoins(format!("invalid denom '{denom}'")))
    }
}

pub fn coins_from_wire(wire: &[WireCoin]) -> Result<Vec<Coin>, KeeperError> {
    wire.iter().map(Coin::from_wire).collect()
}

pub fn coins_to_wire(coins: &[Coin]) -> Vec<WireCoin> {
    coins.iter().map(Coin::to_wire).collect()
}

/// Checks denoms and rejects duplicate denominations within one coin list.
pub fn validate_coins(coins: &[Coin]) -> Result<(), KeeperError> {
    let mut seen = std::collections::BTreeSet::new();
    for coin in coins {
        validate_denom(&coin.denom)?;
        if !seen.insert(coin.denom.as_str()) {
            return Err(KeeperError::InvalidCoins(format!(
                "duplicate denom '{}'",
                coin.denom
            )));
        }
    }
    Ok(())
}

/// Parses a comma-separated list such as `100ukiln,5uatom`. Empty input is an empty list.
pub fn parse_coins(s: &str) -> Result<Vec<Coin>, KeeperError> {
    let coins = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Coin>, _>>()?;
    validate_coins(&coins)?;
    Ok(coins)
}
