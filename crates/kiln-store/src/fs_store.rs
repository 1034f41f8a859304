use crate::{BlobStore, StoreError, StoreResult, io_error};
use kiln_cbor::Hash;
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Filesystem-backed blob store rooted at `<root>/.store/blobs/sha256`.
#[derive(Clone)]
pub struct FsBlobStore {
    blobs_dir: PathBuf,
}

impl fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("blobs_dir", &self.blobs_dir)
            .finish()
    }
}

impl FsBlobStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let blobs_dir = root.as_ref().join(".store").join("blobs").join("sha256");
        fs::create_dir_all(&blobs_dir).map_err(|e| io_error(&blobs_dir, e))?;
        Ok(Self { blobs_dir })
    }

    fn write_once(path: &Path, bytes: &[u8]) -> StoreResult<()> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(bytes).map_err(|e| io_error(path, e))?;
                file.sync_all().map_err(|e| io_error(path, e))?;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(io_error(path, err)),
        }
    }

    fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.blobs_dir.join(hex::encode(hash.as_bytes()))
    }
}

impl BlobStore for FsBlobStore {
    fn put_blob(&self, bytes: &[u8]) -> StoreResult<Hash> {
        let hash = Hash::of_bytes(bytes);
        Self::write_once(&self.blob_path(&hash), bytes)?;
        Ok(hash)
    }

    fn get_blob(&self, hash: Hash) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(&hash);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::BlobNotFound(hash));
            }
            Err(err) => return Err(io_error(path, err)),
        };
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
        Ok(self.blob_path(&hash).exists())
    }
}
