//! Ledger key-value storage plus content-addressed blob stores for contract bytecode.

mod fs_store;
mod kv;
mod mem_store;

pub use fs_store::FsBlobStore;
pub use kv::{MemKv, PrefixStore, ReadOnlyStore};
pub use mem_store::MemBlobStore;

use kiln_cbor::{Hash, to_canonical_cbor};
use serde::{Serialize, de::DeserializeOwned};
use std::{io, path::PathBuf, sync::Arc};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynKv = Arc<dyn KvStore>;
pub type DynBlobStore = Arc<dyn BlobStore>;

/// Ordered byte-keyed store. All methods take `&self`; implementations own their locking.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
    fn remove(&self, key: &[u8]) -> StoreResult<()>;

    /// Entries whose key starts with `prefix`, in ascending key order. Keys are returned whole.
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Typed CBOR helpers on top of any [`KvStore`].
pub trait KvStoreExt: KvStore {
    fn get_cbor<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_cbor::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_cbor<T: Serialize>(&self, key: &[u8], value: &T) -> StoreResult<()> {
        let bytes = to_canonical_cbor(value)?;
        self.set(key, &bytes)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Content-addressed store for immutable blobs (compiled-from bytecode).
pub trait BlobStore: Send + Sync {
    fn put_blob(&self, bytes: &[u8]) -> StoreResult<Hash>;
    fn get_blob(&self, hash: Hash) -> StoreResult<Vec<u8>>;
    fn has_blob(&self, hash: Hash) -> StoreResult<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("blob {0} not found")]
    BlobNotFound(Hash),
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Hash, actual: Hash },
    #[error("write to read-only store (key {key})")]
    ReadOnly { key: String },
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}
