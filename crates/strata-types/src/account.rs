//! Account status

use crate::codec::{amount_from_cell, amount_to_cell, check_amount};
use strata_data::{tag, BlobMap, Cell, DataResult, FromCell, Record, Store, ToCell};

/// Per-account ledger entry
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AccountStatus {
    /// Sequence number of the last accepted transaction
    pub sequence: u64,
    /// Spendable balance
    pub balance: u64,
    /// Bytes of metadata the account may hold
    pub memory_allowance: u64,
    /// Bytes of metadata currently held
    pub memory_usage: u64,
    /// Account metadata, blob key to arbitrary value
    pub metadata: BlobMap,
}

impl AccountStatus {
    /// Fresh account with a balance and memory allowance
    pub fn new(balance: u64, memory_allowance: u64) -> Self {
        Self {
            balance,
            memory_allowance,
            ..Default::default()
        }
    }

    /// Copy with a different balance
    pub fn with_balance(&self, balance: u64) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }

    /// Copy with a different sequence number
    pub fn with_sequence(&self, sequence: u64) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    /// Copy with replaced metadata and the matching memory usage
    pub fn with_metadata(&self, metadata: BlobMap, memory_usage: u64) -> Self {
        Self {
            metadata,
            memory_usage,
            ..self.clone()
        }
    }

    /// Fail if any counter is too large to be stored
    pub fn check_range(&self) -> DataResult<()> {
        check_amount("sequence", self.sequence)?;
        check_amount("balance", self.balance)?;
        check_amount("memory allowance", self.memory_allowance)?;
        check_amount("memory usage", self.memory_usage)?;
        Ok(())
    }

    /// Metadata value under `key`
    pub fn metadata_value(&self, key: &[u8], store: &dyn Store) -> DataResult<Option<Cell>> {
        self.metadata.get(key, store)
    }
}

const FIELDS: usize = 5;

impl ToCell for AccountStatus {
    fn to_cell(&self) -> Cell {
        Record::cell(
            tag::ACCOUNT_STATUS,
            [
                amount_to_cell(self.sequence),
                amount_to_cell(self.balance),
                amount_to_cell(self.memory_allowance),
                amount_to_cell(self.memory_usage),
                self.metadata.to_cell(),
            ],
        )
    }
}

impl FromCell for AccountStatus {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::ACCOUNT_STATUS, FIELDS)?;
        Ok(Self {
            sequence: amount_from_cell(&record.field_cell(0, store)?)?,
            balance: amount_from_cell(&record.field_cell(1, store)?)?,
            memory_allowance: amount_from_cell(&record.field_cell(2, store)?)?,
            memory_usage: amount_from_cell(&record.field_cell(3, store)?)?,
            metadata: BlobMap::from_ref(record.field(4)?, store)?,
        })
    }
}
