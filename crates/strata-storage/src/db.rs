//! RocksDB wrapper

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column family names
pub mod cf {
    /// Cell encodings keyed by hash
    pub const CELLS: &str = "cells";
    /// Named root hashes
    pub const ROOTS: &str = "roots";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[cf::CELLS, cf::ROOTS];

type RocksDB = DBWithThreadMode<MultiThreaded>;

/// Database configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Create database if missing
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size
    pub write_buffer_size: usize,
    /// Maximum write buffers
    pub max_write_buffer_number: i32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 512,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
        }
    }
}

/// RocksDB handle shared between clones, opened and closed explicitly
pub struct Database {
    db: Arc<RwLock<Option<RocksDB>>>,
    path: PathBuf,
}

impl Database {
    /// Create a database handle for `path` (not yet opened)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            db: Arc::new(RwLock::new(None)),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Open the database with default config
    pub fn open(&self) -> StorageResult<()> {
        self.open_with_config(DbConfig::default())
    }

    /// Open the database with custom config
    pub fn open_with_config(&self, config: DbConfig) -> StorageResult<()> {
        let mut db_guard = self.db.write();
        if db_guard.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = RocksDB::open_cf_descriptors(&opts, &self.path, cf_descriptors)?;
        *db_guard = Some(db);
        tracing::info!(path = %self.path.display(), "database opened");
        Ok(())
    }

    /// Close the database
    pub fn close(&self) {
        let mut db_guard = self.db.write();
        *db_guard = None;
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = Self::get_cf(db, cf_name)?;
        Ok(db.get_cf(&cf, key)?)
    }

    /// Check for a key without copying its value
    pub fn contains(&self, cf_name: &str, key: &[u8]) -> StorageResult<bool> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = Self::get_cf(db, cf_name)?;
        Ok(db.get_pinned_cf(&cf, key)?.is_some())
    }

    /// Put a value to a column family
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = Self::get_cf(db, cf_name)?;
        db.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn get_cf<'a>(db: &'a RocksDB, name: &str) -> StorageResult<Arc<BoundColumnFamily<'a>>> {
        db.cf_handle(name)
            .ok_or_else(|| StorageError::InvalidColumnFamily(name.to_string()))
    }

    /// Get database path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        (dir, db)
    }

    #[test]
    fn test_open_close() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());

        assert!(!db.is_open());
        db.open().unwrap();
        assert!(db.is_open());
        db.close();
        assert!(!db.is_open());
    }

    #[test]
    fn test_put_get_contains() {
        let (_dir, db) = open_temp();

        db.put(cf::CELLS, b"key1", b"value1").unwrap();
        assert_eq!(db.get(cf::CELLS, b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(db.contains(cf::CELLS, b"key1").unwrap());
        assert!(!db.contains(cf::CELLS, b"missing").unwrap());
        assert_eq!(db.get(cf::CELLS, b"missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_root() {
        let (_dir, db) = open_temp();

        db.put(cf::ROOTS, b"head", b"first").unwrap();
        db.put(cf::ROOTS, b"head", b"second").unwrap();
        assert_eq!(db.get(cf::ROOTS, b"head").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_not_open_error() {
        let db = Database::new("/tmp/strata_not_opened");
        assert!(matches!(db.get(cf::CELLS, b"key"), Err(StorageError::NotOpen)));
        assert!(matches!(db.put(cf::CELLS, b"key", b"v"), Err(StorageError::NotOpen)));
        assert!(matches!(db.contains(cf::CELLS, b"key"), Err(StorageError::NotOpen)));
    }

    #[test]
    fn test_already_open_error() {
        let (_dir, db) = open_temp();
        assert!(matches!(db.open(), Err(StorageError::AlreadyOpen)));
    }

    #[test]
    fn test_invalid_column_family() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.get("accounts", b"key"),
            Err(StorageError::InvalidColumnFamily(_))
        ));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        db.put(cf::CELLS, b"key1", b"value1").unwrap();
        db.close();

        db.open().unwrap();
        assert_eq!(db.get(cf::CELLS, b"key1").unwrap(), Some(b"value1".to_vec()));
    }

    #[test]
    fn test_column_family_isolation() {
        let (_dir, db) = open_temp();
        db.put(cf::CELLS, b"same_key", b"cell").unwrap();
        db.put(cf::ROOTS, b"same_key", b"root").unwrap();
        assert_eq!(db.get(cf::CELLS, b"same_key").unwrap(), Some(b"cell".to_vec()));
        assert!(db.get(cf::CELLS, b"other_key").unwrap().is_none());
        assert_eq!(db.get(cf::ROOTS, b"same_key").unwrap(), Some(b"root".to_vec()));
    }

    #[test]
    fn test_clone_shares_handle() {
        let (_dir, db) = open_temp();
        let other = db.clone();
        db.put(cf::CELLS, b"k", b"v").unwrap();
        assert_eq!(other.get(cf::CELLS, b"k").unwrap(), Some(b"v".to_vec()));
        other.close();
        assert!(!db.is_open());
    }

    #[test]
    fn test_open_with_custom_config() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        let config = DbConfig {
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024,
            ..DbConfig::default()
        };
        db.open_with_config(config).unwrap();
        assert!(db.is_open());
    }
}
