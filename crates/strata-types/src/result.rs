//! Transaction results

use bytes::Bytes;
use strata_data::{tag, Cell, DataError, DataResult, FromCell, Record, Store, ToCell, Value};
use thiserror::Error;

/// Reason a transaction produced no effect (or only its fee)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    /// Sender account does not exist
    #[error("NOBODY")]
    Nobody,
    /// Transaction sequence is not the account sequence + 1
    #[error("SEQUENCE")]
    Sequence,
    /// Balance does not cover the fee or the transferred amount
    #[error("FUNDS")]
    Funds,
    /// Transaction or payload is malformed
    #[error("FORMAT")]
    BadFormat,
    /// Signature does not match the declared signer
    #[error("SIGNATURE")]
    BadSignature,
    /// Metadata would exceed the memory allowance
    #[error("MEMORY")]
    Memory,
    /// Action refers to ledger state that does not exist
    #[error("STATE")]
    State,
    /// Executor-defined code, passed through unchanged
    #[error("{0}")]
    Application(String),
}

impl ErrorCode {
    fn code(&self) -> Option<i64> {
        Some(match self {
            ErrorCode::Nobody => 1,
            ErrorCode::Sequence => 2,
            ErrorCode::Funds => 3,
            ErrorCode::BadFormat => 4,
            ErrorCode::BadSignature => 5,
            ErrorCode::Memory => 6,
            ErrorCode::State => 7,
            ErrorCode::Application(_) => return None,
        })
    }

    fn from_code(code: i64) -> DataResult<Self> {
        Ok(match code {
            1 => ErrorCode::Nobody,
            2 => ErrorCode::Sequence,
            3 => ErrorCode::Funds,
            4 => ErrorCode::BadFormat,
            5 => ErrorCode::BadSignature,
            6 => ErrorCode::Memory,
            7 => ErrorCode::State,
            other => return Err(DataError::bad_format(format!("unknown error code {}", other))),
        })
    }
}

impl ToCell for ErrorCode {
    fn to_cell(&self) -> Cell {
        match self.code() {
            Some(code) => Cell::long(code),
            // application codes display as their name
            None => Cell::blob(self.to_string().into_bytes()),
        }
    }
}

impl FromCell for ErrorCode {
    fn from_cell(cell: &Cell, _store: &dyn Store) -> DataResult<Self> {
        match cell.value() {
            Value::Long(code) => Self::from_code(*code),
            Value::Blob(name) => String::from_utf8(name.to_vec())
                .map(ErrorCode::Application)
                .map_err(|e| DataError::bad_format(e.to_string())),
            _ => Err(DataError::bad_format("error code must be a long or blob")),
        }
    }
}

/// Outcome of one transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    /// Returned value, or an error message for failures
    pub value: Cell,
    /// Error code, `None` on success
    pub error: Option<ErrorCode>,
}

impl TxResult {
    /// Successful result
    pub fn ok(value: Cell) -> Self {
        Self { value, error: None }
    }

    /// Failed result with no message
    pub fn error(code: ErrorCode) -> Self {
        Self {
            value: Cell::nil(),
            error: Some(code),
        }
    }

    /// Failed result with a message value
    pub fn error_with(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            value: Cell::blob(Bytes::from(message.into())),
            error: Some(code),
        }
    }

    /// True for failed results
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Error code, if any
    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error.as_ref()
    }
}

impl ToCell for TxResult {
    fn to_cell(&self) -> Cell {
        let error = match &self.error {
            Some(code) => code.to_cell(),
            None => Cell::nil(),
        };
        Record::cell(tag::RESULT, [self.value.clone(), error])
    }
}

impl FromCell for TxResult {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::RESULT, 2)?;
        let error = record.field_cell(1, store)?;
        Ok(Self {
            value: record.field_cell(0, store)?,
            error: if error.is_nil() {
                None
            } else {
                Some(ErrorCode::from_cell(&error, store)?)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_data::MemoryStore;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Nobody.to_string(), "NOBODY");
        assert_eq!(ErrorCode::Funds.to_string(), "FUNDS");
        assert_eq!(ErrorCode::Application("ASSERT".into()).to_string(), "ASSERT");
    }

    #[test]
    fn test_error_code_cells() {
        let store = MemoryStore::new();
        for code in [
            ErrorCode::Nobody,
            ErrorCode::Sequence,
            ErrorCode::Funds,
            ErrorCode::BadFormat,
            ErrorCode::BadSignature,
            ErrorCode::Memory,
            ErrorCode::State,
            ErrorCode::Application("TRUST".into()),
        ] {
            assert_eq!(ErrorCode::from_cell(&code.to_cell(), &store).unwrap(), code);
        }
        assert!(ErrorCode::from_cell(&Cell::long(0), &store).is_err());
        assert!(ErrorCode::from_cell(&Cell::nil(), &store).is_err());
    }

    #[test]
    fn test_result_constructors() {
        let ok = TxResult::ok(Cell::long(50));
        assert!(!ok.is_error());
        assert_eq!(ok.error_code(), None);

        let failed = TxResult::error_with(ErrorCode::Funds, "insufficient balance");
        assert!(failed.is_error());
        assert_eq!(failed.error_code(), Some(&ErrorCode::Funds));
        assert_eq!(failed.value.as_blob().unwrap().as_ref(), b"insufficient balance");
    }

    #[test]
    fn test_result_cell_roundtrip() {
        let store = MemoryStore::new();
        for result in [
            TxResult::ok(Cell::long(50)),
            TxResult::error(ErrorCode::Sequence),
            TxResult::error(ErrorCode::Application("CUSTOM".into())),
        ] {
            let cell = Cell::decode(result.to_cell().encoding().clone()).unwrap();
            assert_eq!(TxResult::from_cell(&cell, &store).unwrap(), result);
        }
    }
}
