//! Storage engine implementation using fjall

use accountd_core::{StoreError, StoreResult};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::sync::Arc;

pub mod users;

pub use users::*;

/// Storage engine wrapping fjall keyspace
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<Keyspace>,
}

impl StorageEngine {
    /// Create new storage engine at the given path
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let config = Config::new(path);
        let keyspace = Arc::new(config.open().map_err(backend)?);

        Ok(StorageEngine { keyspace })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> StoreResult<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir().map_err(|e| StoreError::Backend(e.to_string()))?;
        let engine = Self::new(temp_dir.path())?;
        Ok((engine, temp_dir))
    }

    /// Open the credential store backed by this engine
    pub fn credential_store(&self) -> StoreResult<FjallCredentialStore> {
        FjallCredentialStore::open(self.clone())
    }

    pub(crate) fn partition(&self, name: &str) -> StoreResult<PartitionHandle> {
        self.keyspace
            .open_partition(name, PartitionCreateOptions::default())
            .map_err(backend)
    }

    /// Get the underlying keyspace
    pub(crate) fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> StoreResult<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(backend)
    }
}

pub(crate) fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}
