//! Persistent 16-ary vector
//!
//! A node with at most [`VECTOR_FANOUT`] items is a leaf holding the items
//! directly. A larger node holds subtrees of `16^k` items each, the largest
//! such power strictly below its count, with the remainder in the last
//! child. The shape is therefore a function of the count alone, and equal
//! contents always hash equal however they were built.

use crate::cell::{mismatch, read_ref, Cell, Value};
use crate::refs::Ref;
use crate::{tag, vlc, DataError, DataResult, FromCell, Store, ToCell};
use bytes::{BufMut, Bytes, BytesMut};

/// Branching factor
pub const VECTOR_FANOUT: usize = 16;

/// Items per child of a tree node holding `count > 16` items
fn chunk_size(count: u64) -> u64 {
    let mut chunk = VECTOR_FANOUT as u64;
    while let Some(next) = chunk.checked_mul(VECTOR_FANOUT as u64) {
        if next >= count {
            break;
        }
        chunk = next;
    }
    chunk
}

fn child_count(count: u64) -> usize {
    if count <= VECTOR_FANOUT as u64 {
        count as usize
    } else {
        count.div_ceil(chunk_size(count)) as usize
    }
}

fn node_cell(node: VectorNode) -> Cell {
    Cell::new(Value::Vector(node))
}

fn singleton(value: Cell) -> Ref {
    Ref::new(node_cell(VectorNode::build(vec![Ref::new(value)])))
}

fn as_node(cell: &Cell) -> DataResult<&VectorNode> {
    match cell.value() {
        Value::Vector(node) => Ok(node),
        other => Err(mismatch("vector", other)),
    }
}

/// One node of a persistent vector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorNode {
    count: u64,
    children: Vec<Ref>,
}

impl VectorNode {
    /// The empty vector
    pub fn empty() -> Self {
        VectorNode {
            count: 0,
            children: Vec::new(),
        }
    }

    /// Build the canonical tree over `items`
    pub fn build(items: Vec<Ref>) -> Self {
        let count = items.len() as u64;
        if items.len() <= VECTOR_FANOUT {
            return VectorNode {
                count,
                children: items,
            };
        }
        let chunk = chunk_size(count) as usize;
        let children = items
            .chunks(chunk)
            .map(|part| Ref::new(node_cell(VectorNode::build(part.to_vec()))))
            .collect();
        VectorNode { count, children }
    }

    /// Total number of items below this node
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Child references: items for a leaf, subtrees otherwise
    pub fn children(&self) -> &[Ref] {
        &self.children
    }

    fn is_leaf(&self) -> bool {
        self.count <= VECTOR_FANOUT as u64
    }

    fn is_full(&self) -> bool {
        if self.is_leaf() {
            self.count == VECTOR_FANOUT as u64
        } else {
            Some(self.count) == chunk_size(self.count).checked_mul(VECTOR_FANOUT as u64)
        }
    }

    fn expected_child_len(&self, index: usize) -> u64 {
        let chunk = chunk_size(self.count);
        if index + 1 < self.children.len() {
            chunk
        } else {
            self.count - chunk * (self.children.len() as u64 - 1)
        }
    }

    /// Resolve subtree `index` and check that it has the size its position requires
    fn subtree(&self, index: usize, store: &dyn Store) -> DataResult<Cell> {
        let cell = self.children[index].resolve(store)?;
        let expected = self.expected_child_len(index);
        let found = as_node(&cell)?.count;
        if found != expected {
            return Err(DataError::bad_format(format!(
                "vector child {} holds {} items, expected {}",
                index, found, expected
            )));
        }
        Ok(cell)
    }

    fn check_index(&self, index: u64) -> DataResult<()> {
        if index >= self.count {
            return Err(DataError::IndexOutOfBounds {
                index,
                len: self.count,
            });
        }
        Ok(())
    }

    /// Item at `index`
    pub fn get(&self, index: u64, store: &dyn Store) -> DataResult<Cell> {
        self.check_index(index)?;
        if self.is_leaf() {
            return self.children[index as usize].resolve(store);
        }
        let chunk = chunk_size(self.count);
        let child = self.subtree((index / chunk) as usize, store)?;
        as_node(&child)?.get(index % chunk, store)
    }

    /// Copy of this node with the item at `index` replaced
    pub fn assoc(&self, index: u64, value: Cell, store: &dyn Store) -> DataResult<Self> {
        self.check_index(index)?;
        let mut children = self.children.clone();
        if self.is_leaf() {
            children[index as usize] = Ref::new(value);
        } else {
            let chunk = chunk_size(self.count);
            let slot = (index / chunk) as usize;
            let child = self.subtree(slot, store)?;
            let updated = as_node(&child)?.assoc(index % chunk, value, store)?;
            children[slot] = Ref::new(node_cell(updated));
        }
        Ok(VectorNode {
            count: self.count,
            children,
        })
    }

    /// Append `value`. `this` must reference this node; a full node becomes
    /// the first child of the new root.
    pub fn conj(&self, this: &Ref, value: Cell, store: &dyn Store) -> DataResult<Self> {
        let count = self
            .count
            .checked_add(1)
            .ok_or_else(|| DataError::bad_format("vector length overflow"))?;

        if self.is_full() {
            return Ok(VectorNode {
                count,
                children: vec![this.clone(), singleton(value)],
            });
        }
        let mut children = self.children.clone();
        if self.is_leaf() {
            children.push(Ref::new(value));
            return Ok(VectorNode { count, children });
        }

        let last = children.len() - 1;
        if self.expected_child_len(last) == chunk_size(self.count) {
            children.push(singleton(value));
        } else {
            let child = self.subtree(last, store)?;
            let updated = as_node(&child)?.conj(&children[last], value, store)?;
            children[last] = Ref::new(node_cell(updated));
        }
        Ok(VectorNode { count, children })
    }

    /// All items in order
    pub fn to_vec(&self, store: &dyn Store) -> DataResult<Vec<Cell>> {
        let mut out = Vec::with_capacity(self.count.min(1024) as usize);
        self.collect_into(&mut out, store)?;
        Ok(out)
    }

    fn collect_into(&self, out: &mut Vec<Cell>, store: &dyn Store) -> DataResult<()> {
        if self.is_leaf() {
            for item in &self.children {
                out.push(item.resolve(store)?);
            }
            return Ok(());
        }
        for i in 0..self.children.len() {
            let child = self.subtree(i, store)?;
            as_node(&child)?.collect_into(out, store)?;
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(tag::VECTOR);
        vlc::write_count(self.count, buf);
        for child in &self.children {
            child.write(buf);
        }
    }

    pub(crate) fn read(buf: &mut Bytes) -> DataResult<Self> {
        let count = vlc::read_count(buf)?;
        let n = child_count(count);
        let mut children = Vec::with_capacity(n);
        for _ in 0..n {
            let child = read_ref(buf)?;
            if count > VECTOR_FANOUT as u64 && child.is_embedded() {
                return Err(DataError::bad_format("embedded value in vector branch"));
            }
            children.push(child);
        }
        Ok(VectorNode { count, children })
    }
}

/// Immutable vector of cells with structural sharing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vector {
    cell: Cell,
    node: VectorNode,
}

impl Vector {
    fn from_node(node: VectorNode) -> Self {
        Vector {
            cell: node_cell(node.clone()),
            node,
        }
    }

    /// The empty vector
    pub fn empty() -> Self {
        Self::from_node(VectorNode::empty())
    }

    /// Vector holding `items` in order
    pub fn from_cells(items: impl IntoIterator<Item = Cell>) -> Self {
        Self::from_node(VectorNode::build(items.into_iter().map(Ref::new).collect()))
    }

    /// Number of items
    pub fn count(&self) -> u64 {
        self.node.count
    }

    /// True if the vector has no items
    pub fn is_empty(&self) -> bool {
        self.node.count == 0
    }

    /// Item at `index`
    pub fn get(&self, index: u64, store: &dyn Store) -> DataResult<Cell> {
        self.node.get(index, store)
    }

    /// Copy with the item at `index` replaced
    pub fn assoc(&self, index: u64, value: Cell, store: &dyn Store) -> DataResult<Self> {
        Ok(Self::from_node(self.node.assoc(index, value, store)?))
    }

    /// Copy with `value` appended
    pub fn conj(&self, value: Cell, store: &dyn Store) -> DataResult<Self> {
        let this = Ref::new(self.cell.clone());
        Ok(Self::from_node(self.node.conj(&this, value, store)?))
    }

    /// All items in order
    pub fn to_vec(&self, store: &dyn Store) -> DataResult<Vec<Cell>> {
        self.node.to_vec(store)
    }

    /// Root node
    pub fn node(&self) -> &VectorNode {
        &self.node
    }
}

impl Default for Vector {
    fn default() -> Self {
        Self::empty()
    }
}

impl ToCell for Vector {
    fn to_cell(&self) -> Cell {
        self.cell.clone()
    }
}

impl FromCell for Vector {
    fn from_cell(cell: &Cell, _store: &dyn Store) -> DataResult<Self> {
        Ok(Vector {
            node: as_node(cell)?.clone(),
            cell: cell.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use proptest::prelude::*;

    fn longs(n: i64) -> Vec<Cell> {
        (0..n).map(Cell::long).collect()
    }

    // ==================== Shape ====================

    #[test]
    fn test_chunk_size() {
        assert_eq!(chunk_size(17), 16);
        assert_eq!(chunk_size(256), 16);
        assert_eq!(chunk_size(257), 256);
        assert_eq!(chunk_size(4096), 256);
        assert_eq!(chunk_size(4097), 4096);
        assert_eq!(chunk_size(u64::MAX), 1 << 60);
    }

    #[test]
    fn test_leaf_and_tree_child_counts() {
        assert_eq!(Vector::from_cells(longs(16)).node().children().len(), 16);
        assert_eq!(Vector::from_cells(longs(17)).node().children().len(), 2);
        assert_eq!(Vector::from_cells(longs(256)).node().children().len(), 16);
        assert_eq!(Vector::from_cells(longs(257)).node().children().len(), 2);
    }

    #[test]
    fn test_conj_matches_build() {
        let store = MemoryStore::new();
        let mut v = Vector::empty();
        for i in 0..300 {
            v = v.conj(Cell::long(i), &store).unwrap();
            if matches!(i, 0 | 15 | 16 | 17 | 255 | 256 | 299) {
                let built = Vector::from_cells(longs(i + 1));
                assert_eq!(v.to_cell().hash(), built.to_cell().hash(), "size {}", i + 1);
            }
        }
        assert_eq!(v.count(), 300);
    }

    // ==================== Access ====================

    #[test]
    fn test_get_every_index() {
        let store = MemoryStore::new();
        let v = Vector::from_cells(longs(600));
        for i in [0u64, 15, 16, 255, 256, 511, 599] {
            assert_eq!(v.get(i, &store).unwrap().as_long().unwrap(), i as i64);
        }
        assert!(matches!(
            v.get(600, &store),
            Err(DataError::IndexOutOfBounds { index: 600, len: 600 })
        ));
    }

    #[test]
    fn test_assoc_shares_untouched_children() {
        let store = MemoryStore::new();
        let v = Vector::from_cells(longs(100));
        let w = v.assoc(5, Cell::long(-5), &store).unwrap();

        assert_eq!(w.get(5, &store).unwrap().as_long().unwrap(), -5);
        assert_eq!(v.get(5, &store).unwrap().as_long().unwrap(), 5);
        let (old, new) = (v.node().children(), w.node().children());
        assert!(!Ref::ptr_eq(&old[0], &new[0]));
        for i in 1..old.len() {
            assert!(Ref::ptr_eq(&old[i], &new[i]));
        }
    }

    #[test]
    fn test_to_vec_preserves_order() {
        let store = MemoryStore::new();
        let items = longs(40);
        assert_eq!(Vector::from_cells(items.clone()).to_vec(&store).unwrap(), items);
    }

    // ==================== Persistence ====================

    #[test]
    fn test_persist_and_reload() {
        let store = MemoryStore::new();
        let v = Vector::from_cells(longs(300));
        let root = v.to_ref().persist(&store).unwrap();

        let loaded = Vector::from_ref(&Ref::for_hash(root.hash()), &store).unwrap();
        assert_eq!(loaded.count(), 300);
        assert_eq!(loaded.get(287, &store).unwrap().as_long().unwrap(), 287);
        assert_eq!(loaded, v);
    }

    #[test]
    fn test_decode_rejects_missing_children() {
        let mut bytes = vec![tag::VECTOR, 0x03];
        bytes.extend_from_slice(&[tag::LONG, 0x01, tag::LONG, 0x02]);
        assert!(Cell::decode(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn test_wrong_subtree_size_is_bad_format() {
        let store = MemoryStore::new();
        // 17 items claimed, but the first subtree holds only 2
        let small = Vector::from_cells(longs(2));
        let rest = Vector::from_cells(longs(15));
        let bogus = VectorNode {
            count: 17,
            children: vec![small.to_ref(), rest.to_ref()],
        };
        assert!(matches!(bogus.get(0, &store), Err(DataError::BadFormat(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_conj_then_get(values in proptest::collection::vec(any::<i64>(), 0..200)) {
            let store = MemoryStore::new();
            let mut v = Vector::empty();
            for x in &values {
                v = v.conj(Cell::long(*x), &store).unwrap();
            }
            prop_assert_eq!(v.count(), values.len() as u64);
            let built = Vector::from_cells(values.iter().copied().map(Cell::long));
            prop_assert_eq!(v.to_cell().hash(), built.to_cell().hash());
            for (i, x) in values.iter().enumerate() {
                prop_assert_eq!(v.get(i as u64, &store).unwrap().as_long().unwrap(), *x);
            }
        }
    }
}
