//! Blocks

use crate::codec::{amount_from_cell, amount_to_cell, check_amount};
use crate::transaction::SignedTransaction;
use std::fmt;
use std::sync::OnceLock;
use strata_data::{tag, Cell, DataResult, FromCell, Hash, Record, Store, ToCell, Vector};

/// Timestamped, ordered batch of signed transactions
#[derive(Clone)]
pub struct Block {
    timestamp: u64,
    transactions: Vec<SignedTransaction>,
    cell: OnceLock<Cell>,
}

impl Block {
    /// Create a block, rejecting a timestamp or transaction field that
    /// cannot be encoded
    pub fn new(timestamp: u64, transactions: Vec<SignedTransaction>) -> DataResult<Self> {
        check_amount("block timestamp", timestamp)?;
        for signed in &transactions {
            signed.tx.check_range()?;
        }
        Ok(Self {
            timestamp,
            transactions,
            cell: OnceLock::new(),
        })
    }

    /// Block with no transactions, used to advance time
    pub fn empty(timestamp: u64) -> DataResult<Self> {
        Self::new(timestamp, Vec::new())
    }

    /// Block timestamp in milliseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Transactions in application order
    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True if the block carries no transactions
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Hash of the block encoding
    pub fn hash(&self) -> Hash {
        self.cell().hash()
    }

    fn cell(&self) -> &Cell {
        self.cell.get_or_init(|| {
            let txs = Vector::from_cells(self.transactions.iter().map(ToCell::to_cell));
            Record::cell(tag::BLOCK, [amount_to_cell(self.timestamp), txs.to_cell()])
        })
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        if self.timestamp != other.timestamp {
            return false;
        }
        let cached = |b: &Block| b.cell.get().and_then(Cell::cached_hash);
        if let (Some(a), Some(b)) = (cached(self), cached(other)) {
            return a == b;
        }
        self.transactions == other.transactions
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("timestamp", &self.timestamp)
            .field("transactions", &self.transactions)
            .finish()
    }
}

impl ToCell for Block {
    fn to_cell(&self) -> Cell {
        self.cell().clone()
    }
}

impl FromCell for Block {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::BLOCK, 2)?;
        let timestamp = amount_from_cell(&record.field_cell(0, store)?)?;
        let transactions = Vector::from_ref(record.field(1)?, store)?
            .to_vec(store)?
            .iter()
            .map(|c| SignedTransaction::from_cell(c, store))
            .collect::<DataResult<Vec<_>>>()?;
        let block = Self::new(timestamp, transactions)?;
        let _ = block.cell.set(cell.clone());
        Ok(block)
    }
}
