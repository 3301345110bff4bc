//! Immutable content-addressed cells

use crate::blobmap::MapNode;
use crate::record::Record;
use crate::refs::Ref;
use crate::vector::VectorNode;
use crate::{tag, vlc, DataError, DataResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use strata_crypto::sha3_256;
use strata_primitives::Hash;

/// Largest encoding, in bytes, that is written inline in a parent
pub const MAX_EMBEDDED_LENGTH: usize = 140;

/// The closed set of value types, dispatched by tag byte
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent value
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer
    Long(i64),
    /// Byte string
    Blob(Bytes),
    /// Persistent vector node
    Vector(VectorNode),
    /// Blob-keyed map node
    BlobMap(MapNode),
    /// Fixed-layout record
    Record(Record),
}

impl Value {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Long(_) => "long",
            Value::Blob(_) => "blob",
            Value::Vector(_) => "vector",
            Value::BlobMap(_) => "blobmap",
            Value::Record(_) => "record",
        }
    }

    /// Scalars may be embedded; collections and records never are
    fn is_scalar(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(_) | Value::Long(_) | Value::Blob(_))
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Nil => tag::NIL,
            Value::Bool(true) => tag::TRUE,
            Value::Bool(false) => tag::FALSE,
            Value::Long(_) => tag::LONG,
            Value::Blob(_) => tag::BLOB,
            Value::Vector(_) => tag::VECTOR,
            Value::BlobMap(_) => tag::BLOBMAP,
            Value::Record(r) => r.tag(),
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        match self {
            Value::Nil | Value::Bool(_) => buf.put_u8(self.tag()),
            Value::Long(n) => {
                buf.put_u8(tag::LONG);
                vlc::write(*n, buf);
            }
            Value::Blob(bytes) => {
                buf.put_u8(tag::BLOB);
                vlc::write_count(bytes.len() as u64, buf);
                buf.put_slice(bytes);
            }
            Value::Vector(node) => node.write(buf),
            Value::BlobMap(node) => node.write(buf),
            Value::Record(record) => record.write(buf),
        }
    }

    fn refs(&self) -> Vec<&Ref> {
        match self {
            Value::Vector(node) => node.children().iter().collect(),
            Value::BlobMap(node) => node.refs(),
            Value::Record(record) => record.fields().iter().collect(),
            _ => Vec::new(),
        }
    }
}

struct CellInner {
    value: Value,
    encoding: OnceLock<Bytes>,
    hash: OnceLock<Hash>,
    persisted: AtomicBool,
}

/// Immutable unit of the content-addressed graph.
///
/// Cloning is cheap and shares the node. Encoding and hash are computed on
/// first use and cached on the shared node, as is the persisted flag, so a
/// subtree reachable from several states is persisted at most once.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

impl Cell {
    /// Wrap a value
    pub fn new(value: Value) -> Self {
        Cell(Arc::new(CellInner {
            value,
            encoding: OnceLock::new(),
            hash: OnceLock::new(),
            persisted: AtomicBool::new(false),
        }))
    }

    /// Nil cell
    pub fn nil() -> Self {
        Self::new(Value::Nil)
    }

    /// Boolean cell
    pub fn bool(b: bool) -> Self {
        Self::new(Value::Bool(b))
    }

    /// Integer cell
    pub fn long(n: i64) -> Self {
        Self::new(Value::Long(n))
    }

    /// Blob cell
    pub fn blob(bytes: impl Into<Bytes>) -> Self {
        Self::new(Value::Blob(bytes.into()))
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.0.value
    }

    /// Tag byte of this cell's encoding
    pub fn tag(&self) -> u8 {
        self.0.value.tag()
    }

    /// Canonical encoding
    pub fn encoding(&self) -> &Bytes {
        self.0.encoding.get_or_init(|| {
            let mut buf = BytesMut::new();
            self.0.value.write(&mut buf);
            buf.freeze()
        })
    }

    /// SHA3-256 of the canonical encoding
    pub fn hash(&self) -> Hash {
        *self.0.hash.get_or_init(|| sha3_256(self.encoding()))
    }

    /// Hash if it has already been computed
    pub fn cached_hash(&self) -> Option<Hash> {
        self.0.hash.get().copied()
    }

    /// True if this cell is written inline in its parent's encoding
    pub fn is_embedded(&self) -> bool {
        self.0.value.is_scalar() && self.encoding().len() <= MAX_EMBEDDED_LENGTH
    }

    /// Child references in encoding order (map keys are always embedded and excluded)
    pub fn refs(&self) -> Vec<&Ref> {
        self.0.value.refs()
    }

    /// Number of child references
    pub fn ref_count(&self) -> usize {
        self.refs().len()
    }

    /// Child reference at `index`
    pub fn child_ref(&self, index: usize) -> Option<&Ref> {
        self.refs().get(index).copied()
    }

    /// True if both handles point at the same node
    pub fn ptr_eq(a: &Cell, b: &Cell) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn is_persisted(&self) -> bool {
        self.0.persisted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_persisted(&self) {
        self.0.persisted.store(true, Ordering::Release);
    }

    /// Seed the hash cache with a hash already verified against the encoding
    pub(crate) fn set_hash(&self, hash: Hash) {
        let _ = self.0.hash.set(hash);
    }

    /// Decode a complete encoding. Child cells that are not embedded become
    /// unresolved references to be loaded from a store on demand.
    pub fn decode(encoding: Bytes) -> DataResult<Cell> {
        let mut buf = encoding.clone();
        let cell = read_cell(&mut buf)?;
        if buf.has_remaining() {
            return Err(DataError::bad_format(format!(
                "{} trailing bytes after cell",
                buf.remaining()
            )));
        }
        let _ = cell.0.encoding.set(encoding);
        Ok(cell)
    }

    // ==================== Typed accessors ====================

    /// Integer value
    pub fn as_long(&self) -> DataResult<i64> {
        match self.value() {
            Value::Long(n) => Ok(*n),
            other => Err(mismatch("long", other)),
        }
    }

    /// Non-negative integer value
    pub fn as_u64(&self) -> DataResult<u64> {
        let n = self.as_long()?;
        u64::try_from(n).map_err(|_| DataError::bad_format(format!("negative amount {}", n)))
    }

    /// Boolean value
    pub fn as_bool(&self) -> DataResult<bool> {
        match self.value() {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    /// Blob contents
    pub fn as_blob(&self) -> DataResult<&Bytes> {
        match self.value() {
            Value::Blob(b) => Ok(b),
            other => Err(mismatch("blob", other)),
        }
    }

    /// Record contents
    pub fn as_record(&self) -> DataResult<&Record> {
        match self.value() {
            Value::Record(r) => Ok(r),
            other => Err(mismatch("record", other)),
        }
    }

    /// True for the nil cell
    pub fn is_nil(&self) -> bool {
        matches!(self.value(), Value::Nil)
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> DataError {
    DataError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        if Cell::ptr_eq(self, other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.cached_hash(), other.cached_hash()) {
            return a == b;
        }
        self.encoding() == other.encoding()
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0.value, f)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::long(n)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::bool(b)
    }
}

impl From<Bytes> for Cell {
    fn from(bytes: Bytes) -> Self {
        Cell::blob(bytes)
    }
}

// ==================== Decoding ====================

pub(crate) fn read_cell(buf: &mut Bytes) -> DataResult<Cell> {
    if !buf.has_remaining() {
        return Err(DataError::bad_format("missing tag"));
    }
    let t = buf.get_u8();
    let value = match t {
        tag::NIL => Value::Nil,
        tag::TRUE => Value::Bool(true),
        tag::FALSE => Value::Bool(false),
        tag::LONG => Value::Long(vlc::read(buf)?),
        tag::BLOB => {
            let len = vlc::read_count(buf)?;
            if (buf.remaining() as u64) < len {
                return Err(DataError::bad_format("truncated blob"));
            }
            Value::Blob(buf.copy_to_bytes(len as usize))
        }
        tag::VECTOR => Value::Vector(VectorNode::read(buf)?),
        tag::BLOBMAP => Value::BlobMap(MapNode::read(buf)?),
        t if tag::is_record(t) => Value::Record(Record::read(t, buf)?),
        tag::REF => return Err(DataError::bad_format("reference where a value was expected")),
        other => return Err(DataError::bad_format(format!("unknown tag 0x{:02x}", other))),
    };
    Ok(Cell::new(value))
}

/// Read a child reference: either an inline embedded value or `REF` + hash
pub(crate) fn read_ref(buf: &mut Bytes) -> DataResult<Ref> {
    if !buf.has_remaining() {
        return Err(DataError::bad_format("missing child"));
    }
    if buf[0] == tag::REF {
        buf.advance(1);
        if buf.remaining() < Hash::LEN {
            return Err(DataError::bad_format("truncated reference"));
        }
        let hash = Hash::from_slice(&buf.split_to(Hash::LEN))
            .map_err(|e| DataError::bad_format(e.to_string()))?;
        return Ok(Ref::indirect(hash));
    }
    let cell = read_cell(buf)?;
    if !cell.is_embedded() {
        return Err(DataError::bad_format(format!(
            "non-embeddable {} written inline",
            cell.value().type_name()
        )));
    }
    Ok(Ref::new(cell))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(cell: &Cell) -> Cell {
        Cell::decode(cell.encoding().clone()).unwrap()
    }

    // ==================== Scalar encodings ====================

    #[test]
    fn test_scalar_encodings() {
        assert_eq!(Cell::nil().encoding().as_ref(), &[tag::NIL]);
        assert_eq!(Cell::bool(true).encoding().as_ref(), &[tag::TRUE]);
        assert_eq!(Cell::bool(false).encoding().as_ref(), &[tag::FALSE]);
        assert_eq!(Cell::long(1).encoding().as_ref(), &[tag::LONG, 0x01]);
        assert_eq!(
            Cell::blob(vec![0xde, 0xad]).encoding().as_ref(),
            &[tag::BLOB, 0x02, 0xde, 0xad]
        );
    }

    #[test]
    fn test_scalar_roundtrip() {
        for cell in [
            Cell::nil(),
            Cell::bool(true),
            Cell::long(-123456789),
            Cell::long(i64::MAX),
            Cell::blob(vec![7u8; 300]),
        ] {
            assert_eq!(roundtrip(&cell), cell);
        }
    }

    // ==================== Embedding ====================

    #[test]
    fn test_embedding_threshold() {
        // tag + 2 length bytes + payload
        let small = Cell::blob(vec![0u8; MAX_EMBEDDED_LENGTH - 3]);
        let large = Cell::blob(vec![0u8; MAX_EMBEDDED_LENGTH - 2]);
        assert_eq!(small.encoding().len(), MAX_EMBEDDED_LENGTH);
        assert!(small.is_embedded());
        assert!(!large.is_embedded());
    }

    #[test]
    fn test_hash_is_independent_of_identity() {
        let a = Cell::long(1567565765677);
        let b = Cell::long(1567565765677);
        assert!(!Cell::ptr_eq(&a, &b));
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_uses_cached_hashes() {
        let a = Cell::long(5);
        let b = Cell::long(6);
        assert!(a.cached_hash().is_none());
        let _ = (a.hash(), b.hash());
        assert_ne!(a, b);
    }

    // ==================== Malformed input ====================

    #[test]
    fn test_reject_unknown_tag() {
        let err = Cell::decode(Bytes::from_static(&[0x7e])).unwrap_err();
        assert!(matches!(err, DataError::BadFormat(_)));
    }

    #[test]
    fn test_reject_trailing_bytes() {
        assert!(Cell::decode(Bytes::from_static(&[tag::NIL, 0x00])).is_err());
    }

    #[test]
    fn test_reject_truncated_blob() {
        assert!(Cell::decode(Bytes::from_static(&[tag::BLOB, 0x05, 0x01])).is_err());
    }

    #[test]
    fn test_reject_non_canonical_long() {
        assert!(Cell::decode(Bytes::from_static(&[tag::LONG, 0x80, 0x01])).is_err());
    }

    #[test]
    fn test_reject_top_level_ref() {
        let mut bytes = vec![tag::REF];
        bytes.extend_from_slice(&[0u8; 32]);
        assert!(Cell::decode(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Cell::long(9).as_long().unwrap(), 9);
        assert_eq!(Cell::long(9).as_u64().unwrap(), 9);
        assert!(Cell::long(-9).as_u64().is_err());
        assert!(matches!(
            Cell::nil().as_long(),
            Err(DataError::TypeMismatch { expected: "long", found: "nil" })
        ));
        assert!(Cell::bool(true).as_bool().unwrap());
        assert_eq!(Cell::blob(vec![1, 2]).as_blob().unwrap().as_ref(), &[1, 2]);
    }
}
