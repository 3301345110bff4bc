//! Content-addressed cell storage

use crate::DataResult;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_primitives::Hash;

/// Hash-keyed store of cell encodings.
///
/// Entries are immutable: a hash always maps to the same bytes, so writing
/// an existing key is a no-op for callers that check [`Store::has`] first.
pub trait Store: Send + Sync {
    /// Check whether an encoding is stored under `hash`
    fn has(&self, hash: &Hash) -> DataResult<bool>;

    /// Fetch the encoding stored under `hash`
    fn get(&self, hash: &Hash) -> DataResult<Option<Bytes>>;

    /// Store an encoding under its hash. Must be idempotent per hash:
    /// concurrent or repeated puts of the same hash leave one entry.
    fn put(&self, hash: Hash, encoding: Bytes) -> DataResult<()>;
}

/// In-memory store, used for tests and ephemeral ledgers
#[derive(Default)]
pub struct MemoryStore {
    cells: RwLock<HashMap<Hash, Bytes>>,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cells
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    /// Number of `put` calls made so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Store for MemoryStore {
    fn has(&self, hash: &Hash) -> DataResult<bool> {
        Ok(self.cells.read().contains_key(hash))
    }

    fn get(&self, hash: &Hash) -> DataResult<Option<Bytes>> {
        Ok(self.cells.read().get(hash).cloned())
    }

    fn put(&self, hash: Hash, encoding: Bytes) -> DataResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.cells.write().insert(hash, encoding);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("cells", &self.len())
            .field("writes", &self.write_count())
            .finish()
    }
}
