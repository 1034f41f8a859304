use crate::{DynKv, KvStore, StoreError, StoreResult};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, RwLock},
};

/// In-memory ordered store. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemKv {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl std::fmt::Debug for MemKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemKv").field("entries", &self.len()).finish()
    }
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a previously captured [`MemKv::entries`] snapshot.
    pub fn from_entries(entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn entries(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.entries.read().expect("mem kv poisoned").clone()
    }

    /// Replace every entry with `entries`, discarding writes made since the snapshot was taken.
    pub fn restore(&self, entries: BTreeMap<Vec<u8>, Vec<u8>>) {
        *self.entries.write().expect("mem kv poisoned") = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("mem kv poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemKv {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().expect("mem kv poisoned").get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.entries
            .write()
            .expect("mem kv poisoned")
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.entries.write().expect("mem kv poisoned").remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.entries.read().expect("mem kv poisoned");
        let range = guard.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        Ok(range
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// View of `inner` restricted to keys under `prefix`. Keys passed in and returned are relative.
#[derive(Clone)]
pub struct PrefixStore {
    inner: DynKv,
    prefix: Vec<u8>,
}

impl PrefixStore {
    pub fn new(inner: DynKv, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl std::fmt::Debug for PrefixStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixStore")
            .field("prefix", &hex::encode(&self.prefix))
            .finish()
    }
}

impl KvStore for PrefixStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.set(&self.full_key(key), value)
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.inner.remove(&self.full_key(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let strip = self.prefix.len();
        Ok(self
            .inner
            .scan_prefix(&self.full_key(prefix))?
            .into_iter()
            .map(|(key, value)| (key[strip..].to_vec(), value))
            .collect())
    }
}

/// Wrapper that rejects every mutation.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: DynKv,
}

impl ReadOnlyStore {
    pub fn new(inner: DynKv) -> Self {
        Self { inner }
    }

    fn rejected(key: &[u8]) -> StoreError {
        StoreError::ReadOnly {
            key: hex::encode(key),
        }
    }
}

impl KvStore for ReadOnlyStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], _value: &[u8]) -> StoreResult<()> {
        Err(Self::rejected(key))
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        Err(Self::rejected(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan_prefix(prefix)
    }
}
