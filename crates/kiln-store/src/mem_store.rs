use crate::{BlobStore, StoreError, StoreResult};
use kiln_cbor::Hash;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

#[derive(Clone, Default)]
pub struct MemBlobStore {
    blobs: Arc<RwLock<HashMap<Hash, Vec<u8>>>>,
}

impl std::fmt::Debug for MemBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBlobStore")
            .field("blobs", &self.blobs.read().expect("blob store poisoned").len())
            .finish()
    }
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemBlobStore {
    fn put_blob(&self, bytes: &[u8]) -> StoreResult<Hash> {
        let hash = Hash::of_bytes(bytes);
        self.blobs
            .write()
            .expect("blob store poisoned")
            .entry(hash)
            .or_insert_with(|| bytes.to_vec());
        Ok(hash)
    }

    fn get_blob(&self, hash: Hash) -> StoreResult<Vec<u8>> {
        let bytes = self
            .blobs
            .read()
            .expect("blob store poisoned")
            .get(&hash)
            .cloned()
            .ok_or(StoreError::BlobNotFound(hash))?;
        let actual = Hash::of_bytes(&bytes);
        if actual != hash {
            return Err(StoreError::HashMismatch {
                expected: hash,
                actual,
            });
        }
        Ok(bytes)
    }

    fn has_blob(&self, hash: Hash) -> StoreResult<bool> {
        Ok(self
            .blobs
            .read()
            .expect("blob store poisoned")
            .contains_key(&hash))
    }
}
