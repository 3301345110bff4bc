//! Block application

use crate::error::CoreResult;
use crate::executor::{metadata_size, Effect, ExecutionContext, NativeExecutor, StateDelta, TransactionExecutor};
use strata_data::{DataError, DataResult, Store};
use strata_primitives::Address;
use strata_state::{BlockResult, State};
use strata_types::{AccountStatus, Action, Block, ErrorCode, SignedTransaction, TxResult, MAX_AMOUNT};

/// Result of applying a delta: the new state, or the code that rolled it back
type Applied = Result<State, ErrorCode>;

/// Folds blocks over ledger states.
///
/// Every transaction failure is recorded as a result and never stops the
/// rest of the block. Only store failures surface as errors.
#[derive(Clone, Debug, Default)]
pub struct BlockApplier<E = NativeExecutor> {
    executor: E,
    memory_allowance: u64,
}

impl BlockApplier<NativeExecutor> {
    /// Applier running the built-in actions
    pub fn new() -> Self {
        Self::with_executor(NativeExecutor::new())
    }
}

impl<E: TransactionExecutor> BlockApplier<E> {
    /// Applier delegating action execution to `executor`
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            memory_allowance: 0,
        }
    }

    /// Memory allowance given to accounts created by transfers
    pub fn with_memory_allowance(mut self, allowance: u64) -> Self {
        self.memory_allowance = allowance;
        self
    }

    /// Executor in use
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Apply `block` to `state`.
    ///
    /// The state time moves to the block timestamp first, then the block's
    /// transactions run in order, then every scheduled entry now due runs.
    /// A timestamp above [`MAX_AMOUNT`] fails before anything is applied.
    pub fn apply_block(&self, state: &State, block: &Block, store: &dyn Store) -> CoreResult<BlockResult> {
        let mut state = state.with_timestamp(block.timestamp())?;
        let mut results = Vec::with_capacity(block.len());
        for tx in block.transactions() {
            let (next, result) = self.apply_transaction(&state, tx, store)?;
            state = next;
            results.push(result);
        }
        let (state, scheduled_results) = self.run_schedule(state, store)?;

        tracing::info!(
            timestamp = block.timestamp(),
            transactions = results.len(),
            failed = results.iter().filter(|r| r.is_error()).count(),
            scheduled = scheduled_results.len(),
            "block applied"
        );
        Ok(BlockResult::new(state, results, scheduled_results))
    }

    /// Apply one signed transaction, returning the next state and its result
    pub fn apply_transaction(
        &self,
        state: &State,
        signed: &SignedTransaction,
        store: &dyn Store,
    ) -> CoreResult<(State, TxResult)> {
        let sender = signed.signer;
        if let Err(e) = signed.tx.check_range() {
            tracing::debug!(sender = %sender, error = %e, "rejected: field out of range");
            return Ok((state.clone(), TxResult::error_with(ErrorCode::BadFormat, e.to_string())));
        }
        if !signed.verify() {
            tracing::debug!(sender = %sender, "rejected: bad signature");
            return Ok((state.clone(), TxResult::error(ErrorCode::BadSignature)));
        }
        let Some(account) = state.account(&sender, store)? else {
            tracing::debug!(sender = %sender, "rejected: no such account");
            return Ok((state.clone(), TxResult::error(ErrorCode::Nobody)));
        };
        let expected = account.sequence.checked_add(1).filter(|s| *s <= MAX_AMOUNT);
        if expected != Some(signed.tx.sequence) {
            tracing::debug!(
                sender = %sender,
                sequence = signed.tx.sequence,
                current = account.sequence,
                "rejected: bad sequence"
            );
            return Ok((state.clone(), TxResult::error(ErrorCode::Sequence)));
        }

        let (next, result) = self.execute(state, &sender, &account, &signed.tx.action, true, store)?;
        tracing::debug!(
            sender = %sender,
            sequence = signed.tx.sequence,
            action = signed.tx.action.name(),
            error = ?result.error,
            "transaction applied"
        );
        Ok((next, result))
    }

    /// Run every due schedule entry, earliest first
    fn run_schedule(&self, mut state: State, store: &dyn Store) -> CoreResult<(State, Vec<TxResult>)> {
        let mut results = Vec::new();
        while let Some(entry) = state.next_scheduled(store)? {
            if entry.at > state.timestamp() {
                break;
            }
            state = state.without_scheduled(entry.at, &entry.owner, store)?;
            for action in &entry.actions {
                let result = match state.account(&entry.owner, store)? {
                    Some(account) => {
                        let (next, result) = self.execute(&state, &entry.owner, &account, action, false, store)?;
                        state = next;
                        result
                    }
                    None => TxResult::error(ErrorCode::Nobody),
                };
                tracing::debug!(
                    owner = %entry.owner,
                    at = entry.at,
                    action = action.name(),
                    error = ?result.error,
                    "scheduled action run"
                );
                results.push(result);
            }
        }
        Ok((state, results))
    }

    /// Execute `action` for `sender`, charge the fee and apply the delta
    fn execute(
        &self,
        state: &State,
        sender: &Address,
        account: &AccountStatus,
        action: &Action,
        bump_sequence: bool,
        store: &dyn Store,
    ) -> CoreResult<(State, TxResult)> {
        let ctx = ExecutionContext {
            state,
            sender: *sender,
            account,
            store,
            timestamp: state.timestamp(),
        };
        let outcome = self.executor.execute(&ctx, action)?;

        let Some(fee) = outcome.juice.checked_mul(state.juice_price()) else {
            return Ok((state.clone(), TxResult::error(ErrorCode::Funds)));
        };
        let (Some(balance), Some(fees)) = (account.balance.checked_sub(fee), state.fees().checked_add(fee)) else {
            return Ok((state.clone(), TxResult::error(ErrorCode::Funds)));
        };
        let mut charged = account.with_balance(balance);
        if bump_sequence {
            charged = charged.with_sequence(account.sequence + 1);
        }
        let charged_state = state.with_account(sender, &charged, store)?.with_fees(fees)?;

        match outcome.result {
            Err(code) => Ok((charged_state, TxResult::error(code))),
            Ok(value) => match self.apply_delta(&charged_state, sender, &outcome.delta, store)? {
                Ok(next) => Ok((next, TxResult::ok(value))),
                Err(code) => Ok((state.clone(), TxResult::error(code))),
            },
        }
    }

    /// Apply every effect in order, or none of them
    fn apply_delta(&self, state: &State, sender: &Address, delta: &StateDelta, store: &dyn Store) -> DataResult<Applied> {
        let mut state = state.clone();
        for effect in delta.effects() {
            let applied = match effect {
                Effect::Transfer { target, amount } => self.transfer(&state, sender, target, *amount, store)?,
                Effect::Stake { peer, amount } => stake(&state, sender, peer, *amount, store)?,
                Effect::Schedule { at, action } => {
                    let due = if *at <= state.timestamp() {
                        state.timestamp().saturating_add(1)
                    } else {
                        *at
                    };
                    if due > MAX_AMOUNT || action.check_range().is_err() {
                        Err(ErrorCode::BadFormat)
                    } else {
                        Ok(state.with_scheduled(due, sender, action, store)?)
                    }
                }
                Effect::SetMetadata { key, value } => set_metadata(&state, sender, key, value, store)?,
            };
            match applied {
                Ok(next) => state = next,
                Err(code) => return Ok(Err(code)),
            }
        }
        Ok(Ok(state))
    }

    fn transfer(
        &self,
        state: &State,
        sender: &Address,
        target: &Address,
        amount: u64,
        store: &dyn Store,
    ) -> DataResult<Applied> {
        let Some(from) = state.account(sender, store)? else {
            return Ok(Err(ErrorCode::Nobody));
        };
        let Some(remaining) = from.balance.checked_sub(amount) else {
            return Ok(Err(ErrorCode::Funds));
        };
        let state = state.with_account(sender, &from.with_balance(remaining), store)?;

        let to = state
            .account(target, store)?
            .unwrap_or_else(|| AccountStatus::new(0, self.memory_allowance));
        let Some(credited) = to.balance.checked_add(amount).filter(|b| *b <= MAX_AMOUNT) else {
            return Ok(Err(ErrorCode::Funds));
        };
        Ok(Ok(state.with_account(target, &to.with_balance(credited), store)?))
    }
}

fn stake(state: &State, sender: &Address, peer_address: &Address, amount: u64, store: &dyn Store) -> DataResult<Applied> {
    let Some(peer) = state.peer(peer_address, store)? else {
        return Ok(Err(ErrorCode::State));
    };
    let Some(account) = state.account(sender, store)? else {
        return Ok(Err(ErrorCode::Nobody));
    };
    let old = peer.delegated_stake_of(sender, store)?;
    let balance = if amount >= old {
        account.balance.checked_sub(amount - old)
    } else {
        account.balance.checked_add(old - amount)
    };
    let Some(balance) = balance else {
        return Ok(Err(ErrorCode::Funds));
    };
    let peer = match peer.with_delegated_stake(sender, amount, store) {
        Ok(peer) => peer,
        Err(DataError::BadFormat(_)) => return Ok(Err(ErrorCode::Funds)),
        Err(e) => return Err(e),
    };
    let state = state.with_account(sender, &account.with_balance(balance), store)?;
    Ok(Ok(state.with_peer(peer_address, &peer, store)?))
}

fn set_metadata(
    state: &State,
    sender: &Address,
    key: &[u8],
    value: &strata_data::Cell,
    store: &dyn Store,
) -> DataResult<Applied> {
    let Some(account) = state.account(sender, store)? else {
        return Ok(Err(ErrorCode::Nobody));
    };
    let released = match account.metadata_value(key, store)? {
        Some(old) => metadata_size(key, &old),
        None => 0,
    };
    let usage = account
        .memory_usage
        .saturating_sub(released)
        .saturating_add(metadata_size(key, value));
    if usage > account.memory_allowance {
        return Ok(Err(ErrorCode::Memory));
    }
    let metadata = match account.metadata.assoc(key, value.clone(), store) {
        Ok(map) => map,
        Err(DataError::KeyTooLong(_)) => return Ok(Err(ErrorCode::BadFormat)),
        Err(e) => return Err(e),
    };
    Ok(Ok(state.with_account(sender, &account.with_metadata(metadata, usage), store)?))
}
