//! Field codecs shared by the ledger records

use bytes::Bytes;
use strata_data::{Cell, DataError, DataResult};
use strata_primitives::Address;

/// Largest representable amount. Amounts are stored as non-negative longs;
/// genesis rejects a supply above this, and conservation keeps every
/// balance, stake and fee pool below it afterwards.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Address as a 20-byte blob
pub fn address_to_cell(address: &Address) -> Cell {
    Cell::blob(Bytes::copy_from_slice(address.as_bytes()))
}

/// Parse a 20-byte blob into an address
pub fn address_from_cell(cell: &Cell) -> DataResult<Address> {
    Address::from_slice(cell.as_blob()?).map_err(|e| DataError::bad_format(e.to_string()))
}

/// Reject a value a long field cannot hold
pub fn check_amount(field: &str, value: u64) -> DataResult<u64> {
    if value > MAX_AMOUNT {
        return Err(DataError::bad_format(format!("{} out of range: {}", field, value)));
    }
    Ok(value)
}

/// Amount, sequence or timestamp as a long.
///
/// Values above [`MAX_AMOUNT`] saturate. States, blocks and signed
/// transactions run their fields through [`check_amount`] before they are
/// encoded, so a persisted value always decodes to itself.
pub fn amount_to_cell(amount: u64) -> Cell {
    Cell::long(amount.min(MAX_AMOUNT) as i64)
}

/// Parse a non-negative long
pub fn amount_from_cell(cell: &Cell) -> DataResult<u64> {
    cell.as_u64()
}

/// Optional UTF-8 string as a blob, or nil when absent
pub fn string_to_cell(value: Option<&str>) -> Cell {
    match value {
        Some(s) => Cell::blob(Bytes::copy_from_slice(s.as_bytes())),
        None => Cell::nil(),
    }
}

/// Parse an optional UTF-8 string
pub fn string_from_cell(cell: &Cell) -> DataResult<Option<String>> {
    if cell.is_nil() {
        return Ok(None);
    }
    let bytes = cell.as_blob()?;
    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|e| DataError::bad_format(e.to_string()))
}
