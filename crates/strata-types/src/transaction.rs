//! Transactions and their actions

use crate::codec::{address_from_cell, address_to_cell, amount_from_cell, amount_to_cell, check_amount};
use bytes::Bytes;
use strata_crypto::{recover_address, CryptoError, KeyPair, Signature};
use strata_data::{tag, Cell, DataError, DataResult, FromCell, Hash, Record, Store, ToCell};
use strata_primitives::Address;

const TRANSFER: i64 = 0;
const STAKE: i64 = 1;
const SCHEDULE: i64 = 2;
const SET_METADATA: i64 = 3;
const INVOKE: i64 = 4;

/// Operation requested by a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Move funds to another account, creating it if absent
    Transfer {
        /// Receiving account
        target: Address,
        /// Amount moved
        amount: u64,
    },
    /// Set the sender's stake delegated to a peer
    Stake {
        /// Peer receiving the delegation
        peer: Address,
        /// New delegated amount (zero withdraws)
        amount: u64,
    },
    /// Run `action` for the sender at or after timestamp `at`
    Schedule {
        /// Earliest execution time
        at: u64,
        /// Deferred action
        action: Box<Action>,
    },
    /// Bind a metadata key on the sender's account
    SetMetadata {
        /// Metadata key
        key: Bytes,
        /// Stored value
        value: Cell,
    },
    /// Opaque payload for an external executor
    Invoke {
        /// Payload cell
        payload: Cell,
    },
}

impl Action {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::Transfer { .. } => "transfer",
            Action::Stake { .. } => "stake",
            Action::Schedule { .. } => "schedule",
            Action::SetMetadata { .. } => "set-metadata",
            Action::Invoke { .. } => "invoke",
        }
    }

    /// Fail if an amount or time is too large to be encoded
    pub fn check_range(&self) -> DataResult<()> {
        match self {
            Action::Transfer { amount, .. } => check_amount("transfer amount", *amount).map(|_| ()),
            Action::Stake { amount, .. } => check_amount("stake amount", *amount).map(|_| ()),
            Action::Schedule { at, action } => {
                check_amount("schedule time", *at)?;
                action.check_range()
            }
            Action::SetMetadata { .. } | Action::Invoke { .. } => Ok(()),
        }
    }
}

impl ToCell for Action {
    fn to_cell(&self) -> Cell {
        let fields = match self {
            Action::Transfer { target, amount } => vec![
                Cell::long(TRANSFER),
                address_to_cell(target),
                amount_to_cell(*amount),
            ],
            Action::Stake { peer, amount } => vec![
                Cell::long(STAKE),
                address_to_cell(peer),
                amount_to_cell(*amount),
            ],
            Action::Schedule { at, action } => {
                vec![Cell::long(SCHEDULE), amount_to_cell(*at), action.to_cell()]
            }
            Action::SetMetadata { key, value } => {
                vec![Cell::long(SET_METADATA), Cell::blob(key.clone()), value.clone()]
            }
            Action::Invoke { payload } => vec![Cell::long(INVOKE), payload.clone()],
        };
        Record::cell(tag::ACTION, fields)
    }
}

impl FromCell for Action {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = cell.as_record()?;
        if record.tag() != tag::ACTION || record.is_empty() {
            return Err(DataError::bad_format("not an action record"));
        }
        let kind = record.field_cell(0, store)?.as_long()?;
        let arity = if kind == INVOKE { 2 } else { 3 };
        let record = Record::expect(cell, tag::ACTION, arity)?;
        let action = match kind {
            TRANSFER => Action::Transfer {
                target: address_from_cell(&record.field_cell(1, store)?)?,
                amount: amount_from_cell(&record.field_cell(2, store)?)?,
            },
            STAKE => Action::Stake {
                peer: address_from_cell(&record.field_cell(1, store)?)?,
                amount: amount_from_cell(&record.field_cell(2, store)?)?,
            },
            SCHEDULE => Action::Schedule {
                at: amount_from_cell(&record.field_cell(1, store)?)?,
                action: Box::new(Action::from_ref(record.field(2)?, store)?),
            },
            SET_METADATA => Action::SetMetadata {
                key: record.field_cell(1, store)?.as_blob()?.clone(),
                value: record.field_cell(2, store)?,
            },
            INVOKE => Action::Invoke {
                payload: record.field_cell(1, store)?,
            },
            other => return Err(DataError::bad_format(format!("unknown action kind {}", other))),
        };
        Ok(action)
    }
}

/// Sequenced action from one account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Must be exactly one more than the sender's current sequence
    pub sequence: u64,
    /// Requested operation
    pub action: Action,
}

impl Transaction {
    /// Create a transaction
    pub fn new(sequence: u64, action: Action) -> Self {
        Self { sequence, action }
    }

    /// Fail if the sequence or any action field is too large to be encoded
    pub fn check_range(&self) -> DataResult<()> {
        check_amount("sequence", self.sequence)?;
        self.action.check_range()
    }

    /// Transfer shorthand
    pub fn transfer(sequence: u64, target: Address, amount: u64) -> Self {
        Self::new(sequence, Action::Transfer { target, amount })
    }

    /// Hash signed by the sender
    pub fn hash(&self) -> Hash {
        self.to_cell().hash()
    }
}

impl ToCell for Transaction {
    fn to_cell(&self) -> Cell {
        Record::cell(
            tag::TRANSACTION,
            [amount_to_cell(self.sequence), self.action.to_cell()],
        )
    }
}

impl FromCell for Transaction {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::TRANSACTION, 2)?;
        Ok(Self {
            sequence: amount_from_cell(&record.field_cell(0, store)?)?,
            action: Action::from_ref(record.field(1)?, store)?,
        })
    }
}

/// Transaction with the declared signer and its signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Declared sender
    pub signer: Address,
    /// Signature over [`Transaction::hash`]
    pub signature: Signature,
    /// Signed transaction
    pub tx: Transaction,
}

impl SignedTransaction {
    /// Sign `tx` as the owner of `key`
    pub fn sign(key: &KeyPair, tx: Transaction) -> Result<Self, CryptoError> {
        let signature = key.sign(&tx.hash())?;
        Ok(Self {
            signer: key.address(),
            signature,
            tx,
        })
    }

    /// True if the signature recovers to the declared signer. A transaction
    /// whose fields are out of range never verifies.
    pub fn verify(&self) -> bool {
        if self.tx.check_range().is_err() {
            return false;
        }
        recover_address(&self.tx.hash(), &self.signature)
            .map(|recovered| recovered == self.signer)
            .unwrap_or(false)
    }
}

impl ToCell for SignedTransaction {
    fn to_cell(&self) -> Cell {
        Record::cell(
            tag::SIGNED,
            [
                address_to_cell(&self.signer),
                Cell::blob(Bytes::copy_from_slice(&self.signature.to_bytes())),
                self.tx.to_cell(),
            ],
        )
    }
}

impl FromCell for SignedTransaction {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::SIGNED, 3)?;
        let signature = Signature::from_slice(record.field_cell(1, store)?.as_blob()?)
            .map_err(|e| DataError::bad_format(e.to_string()))?;
        Ok(Self {
            signer: address_from_cell(&record.field_cell(0, store)?)?,
            signature,
            tx: Transaction::from_ref(record.field(2)?, store)?,
        })
    }
}
