//! Ledger state snapshot

use crate::schedule::{parse_schedule_key, schedule_key, ScheduledEntry};
use strata_data::{
    tag, BlobMap, Cell, DataError, DataResult, FromCell, Hash, Record, Ref, Store, ToCell, Vector,
};
use strata_primitives::Address;
use strata_types::codec::{address_from_cell, amount_from_cell, amount_to_cell, check_amount};
use strata_types::{AccountStatus, Action, PeerStatus};

/// Immutable snapshot of the whole ledger
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct State {
    accounts: BlobMap,
    peers: BlobMap,
    schedule: BlobMap,
    timestamp: u64,
    fees: u64,
    juice_price: u64,
}

impl State {
    /// Empty ledger at `timestamp`, charging `juice_price` per unit of juice
    pub fn new(timestamp: u64, juice_price: u64) -> DataResult<Self> {
        Ok(Self {
            timestamp: check_amount("timestamp", timestamp)?,
            juice_price: check_amount("juice price", juice_price)?,
            ..Default::default()
        })
    }

    // ==================== Globals ====================

    /// Time of the last applied block, in milliseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Accumulated fee pool
    pub fn fees(&self) -> u64 {
        self.fees
    }

    /// Price of one unit of juice
    pub fn juice_price(&self) -> u64 {
        self.juice_price
    }

    /// Copy at a different time
    pub fn with_timestamp(&self, timestamp: u64) -> DataResult<Self> {
        Ok(Self {
            timestamp: check_amount("timestamp", timestamp)?,
            ..self.clone()
        })
    }

    /// Copy with a different fee pool
    pub fn with_fees(&self, fees: u64) -> DataResult<Self> {
        Ok(Self {
            fees: check_amount("fees", fees)?,
            ..self.clone()
        })
    }

    // ==================== Accounts ====================

    /// Account map, address to account status
    pub fn accounts(&self) -> &BlobMap {
        &self.accounts
    }

    /// Number of accounts
    pub fn account_count(&self) -> u64 {
        self.accounts.count()
    }

    /// Status of `address`, if the account exists
    pub fn account(&self, address: &Address, store: &dyn Store) -> DataResult<Option<AccountStatus>> {
        match self.accounts.get(address.as_bytes(), store)? {
            Some(cell) => Ok(Some(AccountStatus::from_cell(&cell, store)?)),
            None => Ok(None),
        }
    }

    /// Copy with `address` set to `account`
    pub fn with_account(
        &self,
        address: &Address,
        account: &AccountStatus,
        store: &dyn Store,
    ) -> DataResult<Self> {
        account.check_range()?;
        Ok(Self {
            accounts: self
                .accounts
                .assoc(address.as_bytes(), account.to_cell(), store)?,
            ..self.clone()
        })
    }

    /// All accounts in address order
    pub fn account_entries(&self, store: &dyn Store) -> DataResult<Vec<(Address, AccountStatus)>> {
        self.accounts
            .entries(store)?
            .into_iter()
            .map(|(key, cell)| {
                let address = address_from_cell(&Cell::blob(key))?;
                Ok((address, AccountStatus::from_cell(&cell, store)?))
            })
            .collect()
    }

    // ==================== Peers ====================

    /// Peer map, address to peer status
    pub fn peers(&self) -> &BlobMap {
        &self.peers
    }

    /// Status of the peer at `address`
    pub fn peer(&self, address: &Address, store: &dyn Store) -> DataResult<Option<PeerStatus>> {
        match self.peers.get(address.as_bytes(), store)? {
            Some(cell) => Ok(Some(PeerStatus::from_cell(&cell, store)?)),
            None => Ok(None),
        }
    }

    /// Copy with the peer at `address` set to `peer`
    pub fn with_peer(&self, address: &Address, peer: &PeerStatus, store: &dyn Store) -> DataResult<Self> {
        peer.check_range()?;
        Ok(Self {
            peers: self.peers.assoc(address.as_bytes(), peer.to_cell(), store)?,
            ..self.clone()
        })
    }

    /// All peers in address order
    pub fn peer_entries(&self, store: &dyn Store) -> DataResult<Vec<(Address, PeerStatus)>> {
        self.peers
            .entries(store)?
            .into_iter()
            .map(|(key, cell)| {
                let address = address_from_cell(&Cell::blob(key))?;
                Ok((address, PeerStatus::from_cell(&cell, store)?))
            })
            .collect()
    }

    // ==================== Schedule ====================

    /// Schedule map, time and owner to pending actions
    pub fn schedule(&self) -> &BlobMap {
        &self.schedule
    }

    /// Copy with `action` appended to `owner`'s actions due at `at`
    pub fn with_scheduled(
        &self,
        at: u64,
        owner: &Address,
        action: &Action,
        store: &dyn Store,
    ) -> DataResult<Self> {
        check_amount("schedule time", at)?;
        action.check_range()?;
        let key = schedule_key(at, owner);
        let pending = match self.schedule.get(&key, store)? {
            Some(cell) => Vector::from_cell(&cell, store)?,
            None => Vector::empty(),
        };
        let pending = pending.conj(action.to_cell(), store)?;
        Ok(Self {
            schedule: self.schedule.assoc(&key, pending.to_cell(), store)?,
            ..self.clone()
        })
    }

    /// Earliest schedule entry, if any
    pub fn next_scheduled(&self, store: &dyn Store) -> DataResult<Option<ScheduledEntry>> {
        let Some((key, cell)) = self.schedule.first_entry(store)? else {
            return Ok(None);
        };
        let (at, owner) = parse_schedule_key(&key)?;
        let actions = Vector::from_cell(&cell, store)?
            .to_vec(store)?
            .iter()
            .map(|c| Action::from_cell(c, store))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Some(ScheduledEntry { at, owner, actions }))
    }

    /// Copy with the entry for `owner` at `at` removed
    pub fn without_scheduled(&self, at: u64, owner: &Address, store: &dyn Store) -> DataResult<Self> {
        Ok(Self {
            schedule: self.schedule.dissoc(&schedule_key(at, owner), store)?,
            ..self.clone()
        })
    }

    /// Number of (time, owner) entries in the schedule
    pub fn scheduled_count(&self) -> u64 {
        self.schedule.count()
    }

    // ==================== Invariants ====================

    /// Balances, own stakes, delegated stakes and the fee pool, summed
    pub fn compute_total_funds(&self, store: &dyn Store) -> DataResult<u128> {
        let mut total = self.fees as u128;
        for (_, account) in self.account_entries(store)? {
            total += account.balance as u128;
        }
        for (_, peer) in self.peer_entries(store)? {
            total += peer.own_stake() as u128 + peer.delegated_stake() as u128;
        }
        Ok(total)
    }

    /// Check the shape of every map and each peer's delegated total
    /// against its delegation map
    pub fn validate(&self, store: &dyn Store) -> DataResult<()> {
        self.accounts.validate(store)?;
        self.peers.validate(store)?;
        self.schedule.validate(store)?;
        for (_, peer) in self.peer_entries(store)? {
            peer.validate(store)?;
        }
        Ok(())
    }

    // ==================== Persistence ====================

    /// Hash of the state encoding
    pub fn hash(&self) -> Hash {
        self.to_cell().hash()
    }

    /// Write the state and everything it references to `store`
    pub fn persist(&self, store: &dyn Store) -> DataResult<Hash> {
        let root = self.to_ref().persist(store)?;
        tracing::debug!(hash = %root.hash(), accounts = self.account_count(), "state persisted");
        Ok(root.hash())
    }

    /// Load a persisted state by hash
    pub fn load(store: &dyn Store, hash: Hash) -> DataResult<Self> {
        let state = Self::from_ref(&Ref::for_hash(hash), store)?;
        tracing::debug!(hash = %hash, timestamp = state.timestamp, "state loaded");
        Ok(state)
    }
}

const FIELDS: usize = 4;
const GLOBALS: u64 = 3;

impl ToCell for State {
    fn to_cell(&self) -> Cell {
        let globals = Vector::from_cells([
            amount_to_cell(self.timestamp),
            amount_to_cell(self.fees),
            amount_to_cell(self.juice_price),
        ]);
        Record::cell(
            tag::STATE,
            [
                self.accounts.to_cell(),
                self.peers.to_cell(),
                globals.to_cell(),
                self.schedule.to_cell(),
            ],
        )
    }
}

impl FromCell for State {
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self> {
        let record = Record::expect(cell, tag::STATE, FIELDS)?;
        let globals = Vector::from_ref(record.field(2)?, store)?;
        if globals.count() != GLOBALS {
            return Err(DataError::bad_format(format!(
                "state globals hold {} values",
                globals.count()
            )));
        }
        Ok(Self {
            accounts: BlobMap::from_ref(record.field(0)?, store)?,
            peers: BlobMap::from_ref(record.field(1)?, store)?,
            schedule: BlobMap::from_ref(record.field(3)?, store)?,
            timestamp: amount_from_cell(&globals.get(0, store)?)?,
            fees: amount_from_cell(&globals.get(1, store)?)?,
            juice_price: amount_from_cell(&globals.get(2, store)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_data::MemoryStore;

    fn funded(store: &dyn Store) -> State {
        let state = State::new(0, 2).unwrap();
        let state = state
            .with_account(&Address::dummy(1), &AccountStatus::new(10_000, 100), store)
            .unwrap();
        state
            .with_account(&Address::dummy(2), &AccountStatus::new(1_000, 100), store)
            .unwrap()
    }

    #[test]
    fn test_accounts() {
        let store = MemoryStore::new();
        let state = funded(&store);
        assert_eq!(state.account_count(), 2);
        assert_eq!(state.account(&Address::dummy(1), &store).unwrap().unwrap().balance, 10_000);
        assert!(state.account(&Address::dummy(3), &store).unwrap().is_none());

        let addresses: Vec<_> = state
            .account_entries(&store)
            .unwrap()
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(addresses, vec![Address::dummy(1), Address::dummy(2)]);
    }

    #[test]
    fn test_updates_leave_previous_state_intact() {
        let store = MemoryStore::new();
        let before = funded(&store);
        let account = before.account(&Address::dummy(1), &store).unwrap().unwrap();
        let after = before
            .with_account(&Address::dummy(1), &account.with_balance(1), &store)
            .unwrap();
        assert_eq!(before.account(&Address::dummy(1), &store).unwrap().unwrap().balance, 10_000);
        assert_eq!(after.account(&Address::dummy(1), &store).unwrap().unwrap().balance, 1);
        assert_ne!(before.hash(), after.hash());
    }

    #[test]
    fn test_total_funds() {
        let store = MemoryStore::new();
        let peer = PeerStatus::new(500)
            .with_delegated_stake(&Address::dummy(1), 25, &store)
            .unwrap();
        let state = funded(&store)
            .with_peer(&Address::dummy(9), &peer, &store)
            .unwrap()
            .with_fees(7)
            .unwrap();
        assert_eq!(state.compute_total_funds(&store).unwrap(), 10_000 + 1_000 + 500 + 25 + 7);
        state.validate(&store).unwrap();
    }

    // ==================== Schedule ====================

    #[test]
    fn test_schedule_order_and_removal() {
        let store = MemoryStore::new();
        let (a, b) = (Address::dummy(1), Address::dummy(2));
        let first = Action::Transfer { target: b, amount: 1 };
        let second = Action::Transfer { target: b, amount: 2 };
        let state = State::new(0, 1)
            .unwrap()
            .with_scheduled(200, &a, &first, &store)
            .unwrap()
            .with_scheduled(100, &b, &first, &store)
            .unwrap()
            .with_scheduled(200, &a, &second, &store)
            .unwrap();
        assert_eq!(state.scheduled_count(), 2);

        let next = state.next_scheduled(&store).unwrap().unwrap();
        assert_eq!((next.at, next.owner), (100, b));
        let state = state.without_scheduled(next.at, &next.owner, &store).unwrap();

        let next = state.next_scheduled(&store).unwrap().unwrap();
        assert_eq!((next.at, next.owner), (200, a));
        assert_eq!(next.actions, vec![first, second]);
        let state = state.without_scheduled(200, &a, &store).unwrap();
        assert!(state.next_scheduled(&store).unwrap().is_none());
    }

    // ==================== Persistence ====================

    #[test]
    fn test_persist_and_load() {
        let store = MemoryStore::new();
        let state = funded(&store)
            .with_timestamp(1_567_565_765_677)
            .unwrap()
            .with_scheduled(5, &Address::dummy(1), &Action::Invoke { payload: Cell::long(1) }, &store)
            .unwrap();
        let hash = state.persist(&store).unwrap();
        let loaded = State::load(&store, hash).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.timestamp(), 1_567_565_765_677);
        assert_eq!(loaded.juice_price(), 2);
        assert_eq!(loaded.account(&Address::dummy(2), &store).unwrap().unwrap().balance, 1_000);
    }

    #[test]
    fn test_boundary_values_survive_reload() {
        use strata_types::MAX_AMOUNT;

        let store = MemoryStore::new();
        let rich = AccountStatus::new(MAX_AMOUNT, MAX_AMOUNT).with_sequence(MAX_AMOUNT);
        let state = State::new(MAX_AMOUNT, MAX_AMOUNT)
            .unwrap()
            .with_fees(MAX_AMOUNT)
            .unwrap()
            .with_account(&Address::dummy(1), &rich, &store)
            .unwrap()
            .with_peer(&Address::dummy(2), &PeerStatus::new(MAX_AMOUNT), &store)
            .unwrap();
        let hash = state.persist(&store).unwrap();
        let loaded = State::load(&store, hash).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.timestamp(), MAX_AMOUNT);
        assert_eq!(loaded.account(&Address::dummy(1), &store).unwrap().unwrap(), rich);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let store = MemoryStore::new();
        let state = funded(&store);
        assert!(matches!(state.with_timestamp(1 << 63), Err(DataError::BadFormat(_))));
        assert!(matches!(state.with_fees(u64::MAX), Err(DataError::BadFormat(_))));
        assert!(State::new(u64::MAX, 1).is_err());
        assert!(State::new(0, u64::MAX).is_err());

        let overdrawn = AccountStatus::new(u64::MAX, 0);
        assert!(state.with_account(&Address::dummy(3), &overdrawn, &store).is_err());
        assert!(state
            .with_peer(&Address::dummy(3), &PeerStatus::new(1 << 63), &store)
            .is_err());
        let invoke = Action::Invoke { payload: Cell::nil() };
        assert!(state.with_scheduled(u64::MAX, &Address::dummy(1), &invoke, &store).is_err());
        assert_eq!(state.account_count(), 2);
    }

    #[test]
    fn test_load_missing_state() {
        let store = MemoryStore::new();
        assert!(matches!(
            State::load(&store, Hash::from_bytes([1u8; 32])),
            Err(DataError::MissingData(_))
        ));
    }
}
