//! Block application results

use crate::State;
use strata_data::{tag, Cell, DataResult, FromCell, Record, Store, ToCell, Vector};
use strata_types::{ErrorCode, TxResult};

/// Outcome of applying one block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockResult {
    state: State,
    results: Vec<TxResult>,
    scheduled_results: Vec<TxResult>,
}

impl BlockResult {
    /// Bundle the resulting state with per-transaction results
    pub fn new(state: State, results: Vec<TxResult>, scheduled_results: Vec<TxResult>) -> Self {
        Self {
            state,
            results,
            scheduled_results,
        }
    }

    /// State after the block
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Take the resulting state
    pub fn into_state(self) -> State {
        self.state
    }

    /// One result per block transaction, in block order
    pub fn results(&self) -> &[TxResult] {
        &self.results
    }

    /// Results of scheduled actions run after the block's transactions
    pub fn scheduled_results(&self) -> &[TxResult] {
        &self.scheduled_results
    }

    /// Result of transaction `i`
    pub fn result(&self, i: usize) -> Option<&TxResult> {
        self.results.get(i)
    }

    /// Error code of transaction `i`, if it failed
    pub fn error_code(&self, i: usize) -> Option<&ErrorCode> {
        self.result(i).and_then(TxResult::error_code)
    }

    /// True if transaction `i` failed
    pub fn is_error(&self, i: usize) -> bool {
        self.error_code(i).is_some()
    }
}

fn results_cell(results: &[TxResult]) -> Cell {
    Vector::from_cells(results.iter().map(ToCell::to_cell)).to_cell()
}

fn results_from(cell: &Cell, store: &dyn Store) -> DataResult<Vec<TxResult>> {
    Vector::from_cell(cell, store)?
        .to_vec(store)?
        .iter()
        .map(|c| TxResult::from_cell(c, store))
        .collect()
}

impl ToCell for BlockResult {
    fn to_cell(&self) -> Cell {
        Record::cell(
            tag::BLOCK_RESULT,
            [
                self.state.to_cell(),
                results_cell(&self.results),
                results_cell(&self.scheduled_results),
            ],
        )
    }
}

impl FromCell for BlockResult {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::BLOCK_RESULT, 3)?;
        Ok(Self {
            state: State::from_ref(record.field(0)?, store)?,
            results: results_from(&record.field_cell(1, store)?, store)?,
            scheduled_results: results_from(&record.field_cell(2, store)?, store)?,
        })
    }
}
