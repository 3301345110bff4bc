//! RocksDB-backed cell store

use crate::db::{cf, Database, DbConfig};
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use std::path::Path;
use strata_data::{DataResult, Store};
use strata_primitives::Hash;

/// Durable [`Store`] keeping cell encodings in the `cells` column family.
///
/// Named roots (for example the latest state hash) live in `roots` so a
/// reopened database can find its way back into the cell graph.
#[derive(Clone)]
pub struct RocksStore {
    db: Database,
}

impl RocksStore {
    /// Open or create a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(path, DbConfig::default())
    }

    /// Open or create a store at `path` with custom config
    pub fn open_with_config(path: impl AsRef<Path>, config: DbConfig) -> StorageResult<Self> {
        let db = Database::new(path);
        db.open_with_config(config)?;
        Ok(Self { db })
    }

    /// Wrap an already opened database
    pub fn from_database(db: Database) -> StorageResult<Self> {
        if !db.is_open() {
            return Err(StorageError::NotOpen);
        }
        Ok(Self { db })
    }

    /// Underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record `hash` under `name`
    pub fn set_root(&self, name: &str, hash: Hash) -> StorageResult<()> {
        self.db.put(cf::ROOTS, name.as_bytes(), hash.as_bytes())?;
        tracing::debug!(root = name, hash = %hash, "root updated");
        Ok(())
    }

    /// Hash recorded under `name`, if any
    pub fn get_root(&self, name: &str) -> StorageResult<Option<Hash>> {
        match self.db.get(cf::ROOTS, name.as_bytes())? {
            Some(bytes) => Hash::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::InvalidFormat(e.to_string())),
            None => Ok(None),
        }
    }

    /// Close the underlying database
    pub fn close(&self) {
        self.db.close();
    }
}

impl Store for RocksStore {
    fn has(&self, hash: &Hash) -> DataResult<bool> {
        Ok(self.db.contains(cf::CELLS, hash.as_bytes())?)
    }

    fn get(&self, hash: &Hash) -> DataResult<Option<Bytes>> {
        Ok(self.db.get(cf::CELLS, hash.as_bytes())?.map(Bytes::from))
    }

    fn put(&self, hash: Hash, encoding: Bytes) -> DataResult<()> {
        Ok(self.db.put(cf::CELLS, hash.as_bytes(), &encoding)?)
    }
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .field("open", &self.db.is_open())
            .finish()
    }
}
