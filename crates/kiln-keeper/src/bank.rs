//! Reference bank over the ledger key-value store.

use std::collections::BTreeMap;

use kiln_store::{DynKv, KvStore};

use crate::address::Address;
use crate::capability::{AccountLookup, AccountView, Bank, BankError};
use crate::coin::Coin;

const ACCOUNT_PREFIX: u8 = 0x10;
const BALANCE_PREFIX: u8 = 0x11;

/// Balances live under `0x11 | address | denom` as big-endian u128; account existence under
/// `0x10 | address`.
#[derive(Clone)]
pub struct KvBank {
    store: DynKv,
}

impl KvBank {
    pub fn new(store: DynKv) -> Self {
        Self { store }
    }

    /// Mint `coins` into `address`, creating the account. Used for genesis and dev funding.
    pub fn credit(&self, address: &Address, coins: &[Coin]) -> Result<(), BankError> {
        self.ensure_account(address)?;
        for coin in coins {
            let current = self.balance(address, &coin.denom)?;
            let updated = current
                .checked_add(coin.amount)
                .ok_or_else(|| BankError::Overflow {
                    address: *address,
                    denom: coin.denom.clone(),
                })?;
            self.set_balance(address, &coin.denom, updated)?;
        }
        Ok(())
    }

    pub fn balance(&self, address: &Address, denom: &str) -> Result<u128, BankError> {
        match self.store.get(&balance_key(address, denom))? {
            Some(bytes) => Ok(decode_amount(&bytes)),
            None => Ok(0),
        }
    }

    /// Non-zero balances ordered by denom.
    pub fn balances(&self, address: &Address) -> Result<Vec<Coin>, BankError> {
        let prefix = balance_prefix(address);
        let mut coins = Vec::new();
        for (key, value) in self.store.scan_prefix(&prefix)? {
            let denom = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let amount = decode_amount(&value);
            if amount > 0 {
                coins.push(Coin::new(denom, amount));
            }
        }
        Ok(coins)
    }

    fn ensure_account(&self, address: &Address) -> Result<(), BankError> {
        let key = account_key(address);
        if !self.store.has(&key)? {
            self.store.set(&key, &[1])?;
        }
        Ok(())
    }

    fn set_balance(&self, address: &Address, denom: &str, amount: u128) -> Result<(), BankError> {
        let key = balance_key(address, denom);
        if amount == 0 {
            self.store.remove(&key)?;
        } else {
            self.store.set(&key, &amount.to_be_bytes())?;
        }
        Ok(())
    }
}

impl Bank for KvBank {
    fn transfer(&self, from: &Address, to: &Address, coins: &[Coin]) -> Result<(), BankError> {
        // Sum per denom first so a list repeating a denom is checked as a whole.
        let mut totals: BTreeMap<&str, u128> = BTreeMap::new();
        for coin in coins {
            let total = totals.entry(coin.denom.as_str()).or_default();
            *total = total.checked_add(coin.amount).ok_or_else(|| BankError::Overflow {
                address: *from,
                denom: coin.denom.clone(),
            })?;
        }

        let mut updates = Vec::with_capacity(totals.len());
        for (denom, amount) in &totals {
            let available = self.balance(from, denom)?;
            if available < *amount {
                return Err(BankError::InsufficientFunds {
                    address: *from,
                    denom: denom.to_string(),
                    available,
                    needed: *amount,
                });
            }
            if from == to {
                continue;
            }
            let received = self
                .balance(to, denom)?
                .checked_add(*amount)
                .ok_or_else(|| BankError::Overflow {
                    address: *to,
                    denom: denom.to_string(),
                })?;
            updates.push((*denom, available - amount, received));
        }

        self.ensure_account(to)?;
        for (denom, sender_balance, recipient_balance) in updates {
            self.set_balance(from, denom, sender_balance)?;
            self.set_balance(to, denom, recipient_balance)?;
        }
        log::debug!("transfer {from} -> {to}: {}", format_coins(coins));
        Ok(())
    }
}

impl AccountLookup for KvBank {
    fn get_account(&self, address: &Address) -> Result<Option<AccountView>, BankError> {
        if !self.store.has(&account_key(address))? {
            return Ok(None);
        }
        Ok(Some(AccountView {
            address: *address,
            balance: self.balances(address)?,
        }))
    }
}

fn format_coins(coins: &[Coin]) -> String {
    coins
        .iter()
        .map(Coin::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn account_key(address: &Address) -> Vec<u8> {
    let mut key = vec![ACCOUNT_PREFIX];
    key.extend_from_slice(address.as_bytes());
    key
}

fn balance_prefix(address: &Address) -> Vec<u8> {
    let mut key = vec![BALANCE_PREFIX];
    key.extend_from_slice(address.as_bytes());
    key
}

fn balance_key(address: &Address, denom: &str) -> Vec<u8> {
    let mut key = balance_prefix(address);
    key.extend_from_slice(denom.as_bytes());
    key
}

fn decode_amount(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    let len = bytes.len().min(16);
    buf[16 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u128::from_be_bytes(buf)
}
