//! Fixed-layout records

use crate::cell::{read_ref, Cell, Value};
use crate::refs::Ref;
use crate::{tag, vlc, DataError, DataResult, Store};
use bytes::{BufMut, Bytes, BytesMut};

/// Tagged sequence of field references.
///
/// The tag identifies the record type; field meaning is positional and owned
/// by the type that builds the record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    tag: u8,
    fields: Vec<Ref>,
}

impl Record {
    /// Record cell built from field cells. Callers pass one of the record
    /// tag constants from [`tag`].
    pub fn cell(tag: u8, fields: impl IntoIterator<Item = Cell>) -> Cell {
        debug_assert!(tag::is_record(tag));
        let fields = fields.into_iter().map(Ref::new).collect();
        Cell::new(Value::Record(Record { tag, fields }))
    }

    /// Record type tag
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// All fields in order
    pub fn fields(&self) -> &[Ref] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field reference at `index`
    pub fn field(&self, index: usize) -> DataResult<&Ref> {
        self.fields.get(index).ok_or_else(|| {
            DataError::bad_format(format!(
                "record 0x{:02x} has no field {}",
                self.tag, index
            ))
        })
    }

    /// Resolve the field at `index`
    pub fn field_cell(&self, index: usize, store: &dyn Store) -> DataResult<Cell> {
        self.field(index)?.resolve(store)
    }

    /// Borrow `cell` as a record with the given tag and arity
    pub fn expect(cell: &Cell, tag: u8, arity: usize) -> DataResult<&Record> {
        let record = cell.as_record()?;
        if record.tag != tag {
            return Err(DataError::bad_format(format!(
                "expected record 0x{:02x}, found 0x{:02x}",
                tag, record.tag
            )));
        }
        if record.fields.len() != arity {
            return Err(DataError::bad_format(format!(
                "record 0x{:02x} expects {} fields, found {}",
                tag,
                arity,
                record.fields.len()
            )));
        }
        Ok(record)
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag);
        vlc::write_count(self.fields.len() as u64, buf);
        for field in &self.fields {
            field.write(buf);
        }
    }

    pub(crate) fn read(tag: u8, buf: &mut Bytes) -> DataResult<Self> {
        let count = vlc::read_count(buf)?;
        // every field takes at least one byte
        if count > buf.len() as u64 {
            return Err(DataError::bad_format("record field count exceeds input"));
        }
        let fields = (0..count)
            .map(|_| read_ref(buf))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Record { tag, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_record_roundtrip() {
        let cell = Record::cell(tag::ACCOUNT_STATUS, [Cell::long(1), Cell::long(2), Cell::nil()]);
        let decoded = Cell::decode(cell.encoding().clone()).unwrap();
        assert_eq!(decoded, cell);
        let record = Record::expect(&decoded, tag::ACCOUNT_STATUS, 3).unwrap();
        let store = MemoryStore::new();
        assert_eq!(record.field_cell(1, &store).unwrap().as_long().unwrap(), 2);
    }

    #[test]
    fn test_record_encoding_layout() {
        let cell = Record::cell(tag::RESULT, [Cell::long(5), Cell::nil()]);
        assert_eq!(
            cell.encoding().as_ref(),
            &[tag::RESULT, 0x02, tag::LONG, 0x05, tag::NIL]
        );
        assert!(!cell.is_embedded());
    }

    #[test]
    fn test_expect_checks_tag_and_arity() {
        let cell = Record::cell(tag::BLOCK, [Cell::long(0)]);
        assert!(Record::expect(&cell, tag::BLOCK, 1).is_ok());
        assert!(Record::expect(&cell, tag::STATE, 1).is_err());
        assert!(Record::expect(&cell, tag::BLOCK, 2).is_err());
        assert!(Record::expect(&Cell::long(1), tag::BLOCK, 1).is_err());
    }

    #[test]
    fn test_large_field_stored_by_reference() {
        let big = Cell::blob(vec![1u8; 400]);
        let cell = Record::cell(tag::TRANSACTION, [big.clone()]);
        let decoded = Cell::decode(cell.encoding().clone()).unwrap();
        let record = decoded.as_record().unwrap();
        assert!(record.field(0).unwrap().direct().is_none());
        assert_eq!(record.field(0).unwrap().hash(), big.hash());
    }
}
