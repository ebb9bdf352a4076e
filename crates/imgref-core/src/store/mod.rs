pub mod filesystem;
pub mod memory;
pub mod namespaced;

use std::sync::Arc;
use thiserror::Error;

pub use filesystem::FileSystemStore;
pub use memory::MemoryStore;
pub use namespaced::NamespacedStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store key. {0}")]
    InvalidKey(String),
    #[error("Store I/O error. {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-value blob storage the index is persisted into.
///
/// Implementations are synchronous; the index writes its whole state under a
/// single key after every mutation.
pub trait Store: Send + Sync + 'static {
    /// Read the blob stored under `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete the blob under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
}
