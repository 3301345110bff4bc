//! Blob-keyed radix map
//!
//! Keys are split into 4-bit nibbles. Every node records the nibble depth
//! shared by all keys below it; a key whose nibble length equals that depth
//! is the node's entry, and longer keys live in up to 16 children indexed
//! by their next nibble. A node without an entry has at least two children,
//! so the tree for a given key set is unique and hashes identically
//! regardless of insertion order. In-order traversal yields keys in
//! ascending byte order.

use crate::cell::{mismatch, read_cell, read_ref, Cell, Value};
use crate::refs::Ref;
use crate::{tag, vlc, DataError, DataResult, FromCell, Store, ToCell, MAX_EMBEDDED_LENGTH};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest key whose blob encoding still embeds (tag + 2 length bytes + key)
pub const MAX_KEY_LENGTH: usize = MAX_EMBEDDED_LENGTH - 3;

fn nibble(key: &[u8], index: usize) -> u8 {
    let byte = key[index / 2];
    if index % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

fn common_prefix(a: &[u8], b: &[u8], limit: usize) -> usize {
    (0..limit)
        .find(|&i| nibble(a, i) != nibble(b, i))
        .unwrap_or(limit)
}

fn node_cell(node: MapNode) -> Cell {
    Cell::new(Value::BlobMap(node))
}

fn as_map(cell: &Cell) -> DataResult<&MapNode> {
    match cell.value() {
        Value::BlobMap(node) => Ok(node),
        other => Err(mismatch("blobmap", other)),
    }
}

pub(crate) enum Removal {
    Unchanged,
    Empty,
    Replaced(Ref),
}

/// One node of a blob map
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapNode {
    count: u64,
    depth: usize,
    entry: Option<(Bytes, Ref)>,
    mask: u16,
    children: Vec<Ref>,
}

impl MapNode {
    /// The empty map
    pub fn empty() -> Self {
        MapNode {
            count: 0,
            depth: 0,
            entry: None,
            mask: 0,
            children: Vec::new(),
        }
    }

    fn leaf(key: Bytes, value: Ref) -> Self {
        MapNode {
            count: 1,
            depth: key.len() * 2,
            entry: Some((key, value)),
            mask: 0,
            children: Vec::new(),
        }
    }

    /// Number of entries below this node
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Nibble depth shared by every key below this node
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Child subtrees in digit order
    pub fn children(&self) -> &[Ref] {
        &self.children
    }

    /// References held by this node: the entry value, then the children
    pub(crate) fn refs(&self) -> Vec<&Ref> {
        self.entry
            .iter()
            .map(|(_, value)| value)
            .chain(self.children.iter())
            .collect()
    }

    fn slot(&self, digit: u8) -> Option<usize> {
        let bit = 1u16 << digit;
        if self.mask & bit == 0 {
            return None;
        }
        Some((self.mask & (bit - 1)).count_ones() as usize)
    }

    /// Digit of the child at `index`
    fn digit(&self, index: usize) -> u8 {
        (0..16u8)
            .filter(|d| self.mask & (1 << d) != 0)
            .nth(index)
            .unwrap_or(16)
    }

    /// Resolve child `index` and check that it sits strictly deeper than this
    /// node, under this node's prefix, in the slot of its next digit
    fn child(&self, index: usize, store: &dyn Store) -> DataResult<Cell> {
        let cell = self.children[index].resolve(store)?;
        let node = as_map(&cell)?;
        if node.count == 0 || node.depth <= self.depth {
            return Err(DataError::bad_format(format!(
                "map child at depth {} under node at depth {}",
                node.depth, self.depth
            )));
        }
        let key = node.sample_key(store)?;
        let prefix = self.sample_key(store)?;
        let in_prefix = common_prefix(&key, &prefix, self.depth) == self.depth;
        if !in_prefix || nibble(&key, self.depth) != self.digit(index) {
            return Err(DataError::bad_format(format!(
                "map child {} at depth {} holds keys outside its slot",
                index, self.depth
            )));
        }
        Ok(cell)
    }

    /// Any key stored below this node
    fn sample_key(&self, store: &dyn Store) -> DataResult<Bytes> {
        if let Some((key, _)) = &self.entry {
            return Ok(key.clone());
        }
        let first = self
            .children
            .first()
            .ok_or_else(|| DataError::bad_format("map node without keys"))?
            .resolve(store)?;
        as_map(&first)?.sample_key(store)
    }

    /// Value stored under `key`
    pub fn get(&self, key: &[u8], store: &dyn Store) -> DataResult<Option<Cell>> {
        if self.count == 0 {
            return Ok(None);
        }
        let key_len = key.len() * 2;
        if key_len < self.depth {
            return Ok(None);
        }
        if key_len == self.depth {
            return match &self.entry {
                Some((k, v)) if k.as_ref() == key => Ok(Some(v.resolve(store)?)),
                _ => Ok(None),
            };
        }
        match self.slot(nibble(key, self.depth)) {
            Some(i) => {
                let child = self.child(i, store)?;
                as_map(&child)?.get(key, store)
            }
            None => Ok(None),
        }
    }

    /// Copy of this node with `key` bound to `value`. `this` must reference
    /// this node; it is reused as a child when the key splits above it.
    pub(crate) fn assoc(
        &self,
        this: &Ref,
        key: Bytes,
        value: Ref,
        store: &dyn Store,
    ) -> DataResult<Self> {
        if self.count == 0 {
            return Ok(MapNode::leaf(key, value));
        }
        let key_len = key.len() * 2;
        let sample = self.sample_key(store)?;
        let common = common_prefix(&key, &sample, self.depth.min(key_len));

        if common < self.depth {
            let here = nibble(&sample, common);
            if key_len == common {
                return Ok(MapNode {
                    count: self.count + 1,
                    depth: common,
                    entry: Some((key, value)),
                    mask: 1 << here,
                    children: vec![this.clone()],
                });
            }
            let there = nibble(&key, common);
            let leaf = Ref::new(node_cell(MapNode::leaf(key, value)));
            let children = if here < there {
                vec![this.clone(), leaf]
            } else {
                vec![leaf, this.clone()]
            };
            return Ok(MapNode {
                count: self.count + 1,
                depth: common,
                entry: None,
                mask: (1 << here) | (1 << there),
                children,
            });
        }

        let mut node = self.clone();
        if key_len == self.depth {
            if node.entry.is_none() {
                node.count += 1;
            }
            node.entry = Some((key, value));
            return Ok(node);
        }

        let digit = nibble(&key, self.depth);
        match self.slot(digit) {
            Some(i) => {
                let child_cell = self.child(i, store)?;
                let child = as_map(&child_cell)?;
                let updated = child.assoc(&self.children[i], key, value, store)?;
                node.count = self.count - child.count + updated.count;
                node.children[i] = Ref::new(node_cell(updated));
            }
            None => {
                let bit = 1u16 << digit;
                let index = (self.mask & (bit - 1)).count_ones() as usize;
                node.children
                    .insert(index, Ref::new(node_cell(MapNode::leaf(key, value))));
                node.mask |= bit;
                node.count += 1;
            }
        }
        Ok(node)
    }

    /// Remove `key`, collapsing nodes that would no longer be canonical
    pub(crate) fn dissoc(&self, key: &[u8], store: &dyn Store) -> DataResult<Removal> {
        if self.count == 0 {
            return Ok(Removal::Unchanged);
        }
        let key_len = key.len() * 2;
        if key_len < self.depth {
            return Ok(Removal::Unchanged);
        }
        if key_len == self.depth {
            match &self.entry {
                Some((k, _)) if k.as_ref() == key => {}
                _ => return Ok(Removal::Unchanged),
            }
            return Ok(match self.children.len() {
                0 => Removal::Empty,
                1 => Removal::Replaced(self.children[0].clone()),
                _ => Removal::Replaced(Ref::new(node_cell(MapNode {
                    count: self.count - 1,
                    entry: None,
                    ..self.clone()
                }))),
            });
        }

        let digit = nibble(key, self.depth);
        let Some(i) = self.slot(digit) else {
            return Ok(Removal::Unchanged);
        };
        let child = self.child(i, store)?;
        let mut node = self.clone();
        match as_map(&child)?.dissoc(key, store)? {
            Removal::Unchanged => return Ok(Removal::Unchanged),
            Removal::Replaced(r) => node.children[i] = r,
            Removal::Empty => {
                node.children.remove(i);
                node.mask &= !(1u16 << digit);
                if node.entry.is_none() && node.children.len() == 1 {
                    return Ok(Removal::Replaced(node.children[0].clone()));
                }
            }
        }
        node.count -= 1;
        Ok(Removal::Replaced(Ref::new(node_cell(node))))
    }

    fn collect_into(&self, out: &mut Vec<(Bytes, Cell)>, store: &dyn Store) -> DataResult<()> {
        let start = out.len();
        if let Some((key, value)) = &self.entry {
            out.push((key.clone(), value.resolve(store)?));
        }
        for i in 0..self.children.len() {
            let child = self.child(i, store)?;
            as_map(&child)?.collect_into(out, store)?;
        }
        self.check_count((out.len() - start) as u64)
    }

    fn check_count(&self, found: u64) -> DataResult<()> {
        if found != self.count {
            return Err(DataError::bad_format(format!(
                "map node at depth {} claims {} entries, holds {}",
                self.depth, self.count, found
            )));
        }
        Ok(())
    }

    /// Walk every node below this one, checking placement and counts.
    /// Returns the number of entries found.
    fn validate(&self, store: &dyn Store) -> DataResult<u64> {
        if self.count == 0 {
            return Ok(0);
        }
        let mut found = self.entry.is_some() as u64;
        for i in 0..self.children.len() {
            let child = self.child(i, store)?;
            found += as_map(&child)?.validate(store)?;
        }
        self.check_count(found)?;
        Ok(found)
    }

    fn first(&self, store: &dyn Store) -> DataResult<Option<(Bytes, Cell)>> {
        if self.count == 0 {
            return Ok(None);
        }
        if let Some((key, value)) = &self.entry {
            return Ok(Some((key.clone(), value.resolve(store)?)));
        }
        let child = self.child(0, store)?;
        as_map(&child)?.first(store)
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(tag::BLOBMAP);
        vlc::write_count(self.count, buf);
        if self.count == 0 {
            return;
        }
        vlc::write_count(self.depth as u64, buf);
        buf.put_u16(self.mask);
        match &self.entry {
            Some((key, value)) => {
                buf.put_u8(1);
                buf.put_u8(tag::BLOB);
                vlc::write_count(key.len() as u64, buf);
                buf.put_slice(key);
                value.write(buf);
            }
            None => buf.put_u8(0),
        }
        for child in &self.children {
            child.write(buf);
        }
    }

    pub(crate) fn read(buf: &mut Bytes) -> DataResult<Self> {
        let count = vlc::read_count(buf)?;
        if count == 0 {
            return Ok(MapNode::empty());
        }
        let depth = vlc::read_count(buf)?;
        if depth > (MAX_KEY_LENGTH * 2) as u64 {
            return Err(DataError::bad_format(format!("map depth {} too large", depth)));
        }
        let depth = depth as usize;
        if buf.remaining() < 3 {
            return Err(DataError::bad_format("truncated map node"));
        }
        let mask = buf.get_u16();

        let entry = match buf.get_u8() {
            0 => None,
            1 => {
                let key_cell = read_cell(buf)?;
                if !key_cell.is_embedded() {
                    return Err(DataError::bad_format("map key not embeddable"));
                }
                let key = key_cell.as_blob()?.clone();
                if key.len() * 2 != depth {
                    return Err(DataError::bad_format(format!(
                        "map entry key of {} nibbles at depth {}",
                        key.len() * 2,
                        depth
                    )));
                }
                Some((key, read_ref(buf)?))
            }
            other => {
                return Err(DataError::bad_format(format!(
                    "invalid map entry flag {}",
                    other
                )))
            }
        };

        let n = mask.count_ones() as usize;
        let mut children = Vec::with_capacity(n);
        for _ in 0..n {
            let child = read_ref(buf)?;
            if child.is_embedded() {
                return Err(DataError::bad_format("embedded value in map branch"));
            }
            children.push(child);
        }

        let minimum = entry.is_some() as u64 + n as u64;
        let canonical = match (&entry, n) {
            (None, 0 | 1) => false,
            (Some(_), 0) => count == 1,
            _ => count >= minimum,
        };
        if !canonical {
            return Err(DataError::bad_format(format!(
                "non-canonical map node with {} entries and {} children",
                count, n
            )));
        }
        Ok(MapNode {
            count,
            depth,
            entry,
            mask,
            children,
        })
    }
}

/// Immutable map from byte-string keys to cells
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobMap {
    cell: Cell,
    node: MapNode,
}

impl BlobMap {
    fn from_node(node: MapNode) -> Self {
        BlobMap {
            cell: node_cell(node.clone()),
            node,
        }
    }

    fn from_map_ref(r: &Ref, store: &dyn Store) -> DataResult<Self> {
        let cell = r.resolve(store)?;
        Self::from_cell(&cell, store)
    }

    /// The empty map
    pub fn empty() -> Self {
        Self::from_node(MapNode::empty())
    }

    /// Number of entries
    pub fn count(&self) -> u64 {
        self.node.count
    }

    /// True if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.node.count == 0
    }

    /// Value stored under `key`
    pub fn get(&self, key: &[u8], store: &dyn Store) -> DataResult<Option<Cell>> {
        self.node.get(key, store)
    }

    /// True if `key` is present
    pub fn contains_key(&self, key: &[u8], store: &dyn Store) -> DataResult<bool> {
        Ok(self.get(key, store)?.is_some())
    }

    /// Copy with `key` bound to `value`
    pub fn assoc(&self, key: &[u8], value: Cell, store: &dyn Store) -> DataResult<Self> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(DataError::KeyTooLong(key.len()));
        }
        let this = Ref::new(self.cell.clone());
        let node = self
            .node
            .assoc(&this, Bytes::copy_from_slice(key), Ref::new(value), store)?;
        Ok(Self::from_node(node))
    }

    /// Copy without `key`. Returns an equal map if the key is absent.
    pub fn dissoc(&self, key: &[u8], store: &dyn Store) -> DataResult<Self> {
        match self.node.dissoc(key, store)? {
            Removal::Unchanged => Ok(self.clone()),
            Removal::Empty => Ok(Self::empty()),
            Removal::Replaced(r) => Self::from_map_ref(&r, store),
        }
    }

    /// All entries in ascending key order
    pub fn entries(&self, store: &dyn Store) -> DataResult<Vec<(Bytes, Cell)>> {
        let mut out = Vec::with_capacity(self.node.count.min(1024) as usize);
        self.node.collect_into(&mut out, store)?;
        Ok(out)
    }

    /// Check the whole tree: every child lies in the slot of its next key
    /// digit and every node's count matches the entries below it
    pub fn validate(&self, store: &dyn Store) -> DataResult<()> {
        self.node.validate(store).map(|_| ())
    }

    /// Entry with the smallest key
    pub fn first_entry(&self, store: &dyn Store) -> DataResult<Option<(Bytes, Cell)>> {
        self.node.first(store)
    }

    /// Root node
    pub fn node(&self) -> &MapNode {
        &self.node
    }
}

impl Default for BlobMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl ToCell for BlobMap {
    fn to_cell(&self) -> Cell {
        self.cell.clone()
    }
}

impl FromCell for BlobMap {
    fn from_cell(cell: &Cell, _store: &dyn Store) -> DataResult<Self> {
        Ok(BlobMap {
            node: as_map(cell)?.clone(),
            cell: cell.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn build(entries: &[(Vec<u8>, i64)], store: &dyn Store) -> BlobMap {
        entries.iter().fold(BlobMap::empty(), |m, (k, v)| {
            m.assoc(k, Cell::long(*v), store).unwrap()
        })
    }

    fn lookup(map: &BlobMap, key: &[u8], store: &dyn Store) -> Option<i64> {
        map.get(key, store).unwrap().map(|c| c.as_long().unwrap())
    }

    // ==================== Lookup ====================

    #[test]
    fn test_empty_map() {
        let store = MemoryStore::new();
        let m = BlobMap::empty();
        assert!(m.is_empty());
        assert_eq!(m.to_cell().encoding().as_ref(), &[tag::BLOBMAP, 0x00]);
        assert!(m.get(b"x", &store).unwrap().is_none());
        assert!(m.first_entry(&store).unwrap().is_none());
    }

    #[test]
    fn test_assoc_and_get() {
        let store = MemoryStore::new();
        let m = build(&[(vec![0x12], 1), (vec![0x12, 0x34], 2), (vec![0x12, 0x35], 3)], &store);
        assert_eq!(m.count(), 3);
        assert_eq!(lookup(&m, &[0x12], &store), Some(1));
        assert_eq!(lookup(&m, &[0x12, 0x34], &store), Some(2));
        assert_eq!(lookup(&m, &[0x12, 0x35], &store), Some(3));
        assert_eq!(lookup(&m, &[0x12, 0x36], &store), None);
        assert_eq!(lookup(&m, &[0x13], &store), None);
        assert_eq!(lookup(&m, &[], &store), None);
    }

    #[test]
    fn test_replace_keeps_count() {
        let store = MemoryStore::new();
        let m = build(&[(b"alpha".to_vec(), 1), (b"beta".to_vec(), 2)], &store);
        let m = m.assoc(b"alpha", Cell::long(10), &store).unwrap();
        assert_eq!(m.count(), 2);
        assert_eq!(lookup(&m, b"alpha", &store), Some(10));
    }

    #[test]
    fn test_empty_key_is_a_prefix_of_everything() {
        let store = MemoryStore::new();
        let m = build(&[(vec![0xAB], 1), (vec![], 0), (vec![0x01], 2)], &store);
        assert_eq!(lookup(&m, &[], &store), Some(0));
        let keys: Vec<_> = m.entries(&store).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Bytes::new(), Bytes::from_static(&[0x01]), Bytes::from_static(&[0xAB])]);
    }

    #[test]
    fn test_key_too_long() {
        let store = MemoryStore::new();
        let key = vec![0u8; MAX_KEY_LENGTH + 1];
        assert!(matches!(
            BlobMap::empty().assoc(&key, Cell::nil(), &store),
            Err(DataError::KeyTooLong(_))
        ));
        let key = vec![0u8; MAX_KEY_LENGTH];
        assert!(BlobMap::empty().assoc(&key, Cell::nil(), &store).is_ok());
    }

    // ==================== Canonical shape ====================

    #[test]
    fn test_insertion_order_independent() {
        let store = MemoryStore::new();
        let entries = vec![
            (vec![0x10, 0x00], 1),
            (vec![0x10], 2),
            (vec![0x1F, 0x02], 3),
            (vec![0xF0], 4),
            (vec![0x10, 0x01], 5),
        ];
        let forward = build(&entries, &store);
        let mut reversed = entries.clone();
        reversed.reverse();
        let backward = build(&reversed, &store);
        assert_eq!(forward.to_cell().hash(), backward.to_cell().hash());
    }

    #[test]
    fn test_dissoc_restores_canonical_form() {
        let store = MemoryStore::new();
        let base = build(&[(vec![0x01], 1), (vec![0x02], 2)], &store);
        let with_extra = base.assoc(&[0x01, 0x05], Cell::long(9), &store).unwrap();
        let removed = with_extra.dissoc(&[0x01, 0x05], &store).unwrap();
        assert_eq!(removed.to_cell().hash(), base.to_cell().hash());

        let single = base.dissoc(&[0x02], &store).unwrap();
        assert_eq!(single.to_cell().hash(), build(&[(vec![0x01], 1)], &store).to_cell().hash());
        assert!(single.dissoc(&[0x01], &store).unwrap().is_empty());
    }

    #[test]
    fn test_dissoc_absent_is_unchanged() {
        let store = MemoryStore::new();
        let m = build(&[(vec![0x01], 1)], &store);
        let same = m.dissoc(&[0x02], &store).unwrap();
        assert_eq!(same, m);
    }

    #[test]
    fn test_assoc_shares_untouched_children() {
        let store = MemoryStore::new();
        let m = build(&[(vec![0x10], 1), (vec![0x20], 2), (vec![0x30], 3)], &store);
        let n = m.assoc(&[0x31], Cell::long(4), &store).unwrap();
        let (old, new) = (m.node().children(), n.node().children());
        assert_eq!(old.len(), 3);
        assert!(Ref::ptr_eq(&old[0], &new[0]));
        assert!(Ref::ptr_eq(&old[1], &new[1]));
        assert!(!Ref::ptr_eq(&old[2], &new[2]));
    }

    // ==================== Persistence and decoding ====================

    #[test]
    fn test_persist_and_reload() {
        let store = MemoryStore::new();
        let entries: Vec<_> = (0..50u8).map(|i| (vec![i, i.wrapping_mul(7)], i as i64)).collect();
        let m = build(&entries, &store);
        let root = m.to_ref().persist(&store).unwrap();

        let loaded = BlobMap::from_ref(&Ref::for_hash(root.hash()), &store).unwrap();
        assert_eq!(loaded.count(), 50);
        assert_eq!(lookup(&loaded, &[7, 49], &store), Some(7));
        let updated = loaded.assoc(&[200], Cell::long(-1), &store).unwrap();
        assert_eq!(updated.count(), 51);
    }

    #[test]
    fn test_decode_rejects_bad_entry_flag() {
        let bytes = vec![tag::BLOBMAP, 0x01, 0x02, 0x00, 0x00, 0x02];
        assert!(Cell::decode(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn test_decode_rejects_key_depth_mismatch() {
        // one entry, depth 4 nibbles, key of 1 byte
        let bytes = vec![tag::BLOBMAP, 0x01, 0x04, 0x00, 0x00, 0x01, tag::BLOB, 0x01, 0xAA, tag::NIL];
        assert!(Cell::decode(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn test_decode_accepts_leaf() {
        let bytes = vec![tag::BLOBMAP, 0x01, 0x02, 0x00, 0x00, 0x01, tag::BLOB, 0x01, 0xAA, tag::NIL];
        let cell = Cell::decode(Bytes::from(bytes)).unwrap();
        let store = MemoryStore::new();
        let m = BlobMap::from_cell(&cell, &store).unwrap();
        assert_eq!(m, BlobMap::empty().assoc(&[0xAA], Cell::nil(), &store).unwrap());
    }

    #[test]
    fn test_decode_rejects_single_child_branch() {
        let leaf = MapNode::leaf(Bytes::from_static(&[0x12]), Ref::new(Cell::nil()));
        let leaf_hash = node_cell(leaf).hash();
        let mut bytes = vec![tag::BLOBMAP, 0x01, 0x01, 0x00, 0x04, 0x00, tag::REF];
        bytes.extend_from_slice(leaf_hash.as_bytes());
        assert!(Cell::decode(Bytes::from(bytes)).is_err());
    }

    fn stored_leaf(key: &'static [u8], store: &dyn Store) -> Ref {
        let leaf = MapNode::leaf(Bytes::from_static(key), Ref::new(Cell::long(1)));
        Ref::new(node_cell(leaf)).persist(store).unwrap()
    }

    fn reload(node: MapNode, store: &dyn Store) -> BlobMap {
        let root = Ref::new(node_cell(node)).persist(store).unwrap();
        let cell = Cell::decode(root.resolve(store).unwrap().encoding().clone()).unwrap();
        BlobMap::from_cell(&cell, store).unwrap()
    }

    #[test]
    fn test_count_mismatch_detected() {
        let store = MemoryStore::new();
        let node = MapNode {
            count: 7,
            depth: 0,
            entry: None,
            mask: (1 << 1) | (1 << 3),
            children: vec![stored_leaf(&[0x12], &store), stored_leaf(&[0x34], &store)],
        };
        let m = reload(node, &store);
        assert!(matches!(m.entries(&store), Err(DataError::BadFormat(_))));
        assert!(m.validate(&store).is_err());
    }

    #[test]
    fn test_child_in_wrong_slot_detected() {
        let store = MemoryStore::new();
        let node = MapNode {
            count: 2,
            depth: 0,
            entry: None,
            mask: (1 << 1) | (1 << 5),
            children: vec![stored_leaf(&[0x12], &store), stored_leaf(&[0x34], &store)],
        };
        let m = reload(node, &store);
        assert!(m.get(&[0x56], &store).is_err());
        assert!(m.entries(&store).is_err());
        assert!(m.validate(&store).is_err());

        let swapped = MapNode {
            count: 2,
            depth: 0,
            entry: None,
            mask: (1 << 1) | (1 << 3),
            children: vec![stored_leaf(&[0x34], &store), stored_leaf(&[0x12], &store)],
        };
        let m = reload(swapped, &store);
        assert!(m.get(&[0x12], &store).is_err());
        assert!(m.validate(&store).is_err());
    }

    #[test]
    fn test_child_outside_prefix_detected() {
        let store = MemoryStore::new();
        // depth 1 claims a shared first nibble the children do not have
        let node = MapNode {
            count: 2,
            depth: 1,
            entry: None,
            mask: (1 << 2) | (1 << 3),
            children: vec![stored_leaf(&[0x12], &store), stored_leaf(&[0x23], &store)],
        };
        let m = reload(node, &store);
        assert!(m.get(&[0x23], &store).is_err());
        assert!(m.validate(&store).is_err());
    }

    #[test]
    fn test_built_maps_validate() {
        let store = MemoryStore::new();
        let entries: Vec<_> = (0..40u8).map(|i| (vec![i, i ^ 0x5A], i as i64)).collect();
        let m = build(&entries, &store);
        m.validate(&store).unwrap();
        let m = m.dissoc(&[3, 3 ^ 0x5A], &store).unwrap().assoc(&[], Cell::nil(), &store).unwrap();
        m.validate(&store).unwrap();
        BlobMap::empty().validate(&store).unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_matches_btreemap(
            entries in proptest::collection::vec((proptest::collection::vec(any::<u8>(), 0..4), any::<i64>()), 0..40),
            removals in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..4), 0..10),
        ) {
            let store = MemoryStore::new();
            let mut model = BTreeMap::new();
            let mut map = BlobMap::empty();
            for (k, v) in &entries {
                model.insert(k.clone(), *v);
                map = map.assoc(k, Cell::long(*v), &store).unwrap();
            }
            for k in &removals {
                model.remove(k);
                map = map.dissoc(k, &store).unwrap();
            }
            prop_assert_eq!(map.count(), model.len() as u64);
            let listed: Vec<(Vec<u8>, i64)> = map
                .entries(&store)
                .unwrap()
                .into_iter()
                .map(|(k, v)| (k.to_vec(), v.as_long().unwrap()))
                .collect();
            let expected: Vec<(Vec<u8>, i64)> = model.clone().into_iter().collect();
            prop_assert_eq!(listed, expected);

            // the same key set built in sorted order has the same hash
            let sorted: Vec<(Vec<u8>, i64)> = model.into_iter().collect();
            prop_assert_eq!(build(&sorted, &store).to_cell().hash(), map.to_cell().hash());
        }
    }
}
