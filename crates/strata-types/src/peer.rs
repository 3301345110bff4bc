//! Peer status

use crate::codec::{amount_from_cell, amount_to_cell, check_amount, string_from_cell, string_to_cell};
use strata_data::{tag, BlobMap, Cell, DataError, DataResult, FromCell, Record, Store, ToCell};
use strata_primitives::Address;

/// Stake held by a peer and delegated to it by other accounts.
///
/// `delegated_stake` always equals the sum of the values in `stakes`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PeerStatus {
    stake: u64,
    stakes: BlobMap,
    delegated_stake: u64,
    host: Option<String>,
}

impl PeerStatus {
    /// Peer with its own stake and no delegations
    pub fn new(stake: u64) -> Self {
        Self {
            stake,
            ..Default::default()
        }
    }

    /// Copy with a host URL
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..self.clone()
        }
    }

    /// Own stake, excluding delegations
    pub fn own_stake(&self) -> u64 {
        self.stake
    }

    /// Sum of all delegated stake
    pub fn delegated_stake(&self) -> u64 {
        self.delegated_stake
    }

    /// Own stake plus delegated stake
    pub fn total_stake(&self) -> u64 {
        self.stake.saturating_add(self.delegated_stake)
    }

    /// Host URL, if announced
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Delegation map, delegator address to amount
    pub fn stakes(&self) -> &BlobMap {
        &self.stakes
    }

    /// Stake delegated by `delegator`, zero if none
    pub fn delegated_stake_of(&self, delegator: &Address, store: &dyn Store) -> DataResult<u64> {
        match self.stakes.get(delegator.as_bytes(), store)? {
            Some(cell) => amount_from_cell(&cell),
            None => Ok(0),
        }
    }

    /// Copy with `delegator`'s stake set to `new_stake`. A zero stake
    /// removes the delegator; an unchanged stake returns an equal status
    /// sharing the same map.
    pub fn with_delegated_stake(
        &self,
        delegator: &Address,
        new_stake: u64,
        store: &dyn Store,
    ) -> DataResult<Self> {
        let old_stake = self.delegated_stake_of(delegator, store)?;
        if old_stake == new_stake {
            return Ok(self.clone());
        }
        let delegated_stake = self
            .delegated_stake
            .checked_sub(old_stake)
            .and_then(|rest| rest.checked_add(new_stake))
            .ok_or_else(|| DataError::bad_format("delegated stake out of range"))?;
        check_amount("delegated stake", delegated_stake)?;
        let stakes = if new_stake == 0 {
            self.stakes.dissoc(delegator.as_bytes(), store)?
        } else {
            self.stakes
                .assoc(delegator.as_bytes(), amount_to_cell(new_stake), store)?
        };
        Ok(Self {
            stakes,
            delegated_stake,
            ..self.clone()
        })
    }

    /// Fail if the own or delegated stake is too large to be stored
    pub fn check_range(&self) -> DataResult<()> {
        check_amount("stake", self.stake)?;
        check_amount("delegated stake", self.delegated_stake)?;
        Ok(())
    }

    /// Sum of the delegation map
    pub fn compute_delegated_stake(&self, store: &dyn Store) -> DataResult<u64> {
        self.stakes
            .entries(store)?
            .iter()
            .try_fold(0u64, |sum, (_, cell)| {
                let amount = amount_from_cell(cell)?;
                sum.checked_add(amount)
                    .ok_or_else(|| DataError::bad_format("delegated stake overflow"))
            })
    }

    /// Check that the cached delegated total matches the delegation map
    pub fn validate(&self, store: &dyn Store) -> DataResult<()> {
        let computed = self.compute_delegated_stake(store)?;
        if computed != self.delegated_stake {
            return Err(DataError::bad_format(format!(
                "delegated stake {} does not match delegations {}",
                self.delegated_stake, computed
            )));
        }
        Ok(())
    }
}

const FIELDS: usize = 4;

impl ToCell for PeerStatus {
    fn to_cell(&self) -> Cell {
        Record::cell(
            tag::PEER_STATUS,
            [
                amount_to_cell(self.stake),
                self.stakes.to_cell(),
                amount_to_cell(self.delegated_stake),
                string_to_cell(self.host.as_deref()),
            ],
        )
    }
}

impl FromCell for PeerStatus {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::PEER_STATUS, FIELDS)?;
        Ok(Self {
            stake: amount_from_cell(&record.field_cell(0, store)?)?,
            stakes: BlobMap::from_ref(record.field(1)?, store)?,
            delegated_stake: amount_from_cell(&record.field_cell(2, store)?)?,
            host: string_from_cell(&record.field_cell(3, store)?)?,
        })
    }
}
