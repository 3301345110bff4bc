//! References between cells

use crate::cell::Cell;
use crate::{tag, DataError, DataResult, Store};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::sync::{Arc, OnceLock};
use strata_crypto::sha3_256;
use strata_primitives::Hash;

/// How much is known about where a referenced cell lives.
///
/// `Embedded` and `Stored` are both above `Unknown`; `Persisted` is the
/// top. A ref never moves down the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefStatus {
    /// In memory only; nothing known about the store
    Unknown,
    /// Written inline in the parent; never stored on its own
    Embedded,
    /// Decoded as a hash reference, so the cell was stored somewhere
    Stored,
    /// The cell and its whole subtree are in the store
    Persisted,
}

#[derive(Clone)]
enum Target {
    Direct(Cell),
    Indirect {
        hash: Hash,
        status: RefStatus,
        cache: Arc<OnceLock<Cell>>,
    },
}

/// Handle to a cell, either held directly or known only by hash
#[derive(Clone)]
pub struct Ref {
    target: Target,
}

impl Ref {
    /// Reference to an in-memory cell
    pub fn new(cell: Cell) -> Self {
        Ref {
            target: Target::Direct(cell),
        }
    }

    /// Reference to a stored cell known only by hash
    pub fn for_hash(hash: Hash) -> Self {
        Self::indirect(hash)
    }

    pub(crate) fn indirect(hash: Hash) -> Self {
        Ref {
            target: Target::Indirect {
                hash,
                status: RefStatus::Stored,
                cache: Arc::new(OnceLock::new()),
            },
        }
    }

    /// Hash of the referenced cell
    pub fn hash(&self) -> Hash {
        match &self.target {
            Target::Direct(cell) => cell.hash(),
            Target::Indirect { hash, .. } => *hash,
        }
    }

    /// Current status of this reference
    pub fn status(&self) -> RefStatus {
        match &self.target {
            Target::Direct(cell) => {
                if cell.is_embedded() {
                    RefStatus::Embedded
                } else if cell.is_persisted() {
                    RefStatus::Persisted
                } else {
                    RefStatus::Unknown
                }
            }
            Target::Indirect { status, cache, .. } => match cache.get() {
                Some(cell) if cell.is_persisted() => RefStatus::Persisted,
                _ => *status,
            },
        }
    }

    /// True if the referenced cell is written inline in its parent
    pub fn is_embedded(&self) -> bool {
        match &self.target {
            Target::Direct(cell) => cell.is_embedded(),
            // decoding never produces an indirect ref to an embeddable cell
            Target::Indirect { .. } => false,
        }
    }

    /// The cell, if it is already in memory
    pub fn direct(&self) -> Option<&Cell> {
        match &self.target {
            Target::Direct(cell) => Some(cell),
            Target::Indirect { cache, .. } => cache.get(),
        }
    }

    /// True if both refs share the same in-memory target
    pub fn ptr_eq(a: &Ref, b: &Ref) -> bool {
        match (&a.target, &b.target) {
            (Target::Direct(x), Target::Direct(y)) => Cell::ptr_eq(x, y),
            (Target::Indirect { cache: x, .. }, Target::Indirect { cache: y, .. }) => {
                Arc::ptr_eq(x, y)
            }
            _ => false,
        }
    }

    /// Materialise the referenced cell, loading it from `store` if needed.
    ///
    /// Loaded bytes must hash to the referenced hash and must not be an
    /// embeddable value. The decoded cell is cached on this ref and every
    /// clone of it.
    pub fn resolve(&self, store: &dyn Store) -> DataResult<Cell> {
        let (hash, status, cache) = match &self.target {
            Target::Direct(cell) => return Ok(cell.clone()),
            Target::Indirect {
                hash,
                status,
                cache,
            } => (hash, status, cache),
        };
        if let Some(cell) = cache.get() {
            return Ok(cell.clone());
        }

        let bytes = store.get(hash)?.ok_or(DataError::MissingData(*hash))?;
        let actual = sha3_256(&bytes);
        if actual != *hash {
            tracing::warn!(expected = %hash, actual = %actual, "store returned bytes with wrong hash");
            return Err(DataError::HashMismatch {
                expected: *hash,
                actual,
            });
        }
        let cell = Cell::decode(bytes)?;
        if cell.is_embedded() {
            return Err(DataError::bad_format(format!(
                "embeddable {} stored by reference",
                cell.value().type_name()
            )));
        }
        cell.set_hash(actual);
        if *status == RefStatus::Persisted {
            cell.mark_persisted();
        }
        Ok(cache.get_or_init(|| cell).clone())
    }

    /// Write the referenced cell and all of its descendants to `store`.
    ///
    /// Children are written before their parent, so any hash present in the
    /// store has its whole subtree present too. Cells already marked
    /// persisted are skipped without touching the store, and a hash the
    /// store already has is never written again.
    pub fn persist(&self, store: &dyn Store) -> DataResult<Ref> {
        match &self.target {
            Target::Direct(cell) => {
                persist_cell(cell, store)?;
                Ok(self.clone())
            }
            Target::Indirect {
                hash,
                status,
                cache,
            } => {
                if let Some(cell) = cache.get() {
                    persist_cell(cell, store)?;
                } else if *status != RefStatus::Persisted && !store.has(hash)? {
                    return Err(DataError::MissingData(*hash));
                }
                Ok(Ref {
                    target: Target::Indirect {
                        hash: *hash,
                        status: RefStatus::Persisted,
                        cache: cache.clone(),
                    },
                })
            }
        }
    }

    /// Append this reference to a parent's encoding
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        match &self.target {
            Target::Direct(cell) if cell.is_embedded() => buf.put_slice(cell.encoding()),
            _ => {
                buf.put_u8(tag::REF);
                buf.put_slice(self.hash().as_bytes());
            }
        }
    }
}

fn persist_cell(cell: &Cell, store: &dyn Store) -> DataResult<()> {
    if cell.is_embedded() || cell.is_persisted() {
        return Ok(());
    }
    for child in cell.refs() {
        child.persist(store)?;
    }
    let hash = cell.hash();
    if !store.has(&hash)? {
        store.put(hash, cell.encoding().clone())?;
    }
    cell.mark_persisted();
    Ok(())
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (Target::Direct(a), Target::Direct(b)) => a == b,
            _ => self.hash() == other.hash(),
        }
    }
}

impl Eq for Ref {}

impl From<Cell> for Ref {
    fn from(cell: Cell) -> Self {
        Ref::new(cell)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Direct(cell) => write!(f, "Ref({:?})", cell),
            Target::Indirect { hash, status, .. } => write!(f, "Ref({}, {:?})", hash, status),
        }
    }
}
