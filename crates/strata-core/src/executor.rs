//! Transaction executor boundary

use strata_data::{Bytes, Cell, DataResult, Store, MAX_KEY_LENGTH};
use strata_primitives::Address;
use strata_state::State;
use strata_types::{AccountStatus, Action, ErrorCode, MAX_AMOUNT};

/// Juice charged by [`NativeExecutor`] per action
pub mod juice {
    /// Transfer
    pub const TRANSFER: u64 = 100;
    /// Stake delegation
    pub const STAKE: u64 = 200;
    /// Scheduling a deferred action
    pub const SCHEDULE: u64 = 300;
    /// Metadata update, plus one per byte stored
    pub const SET: u64 = 50;
    /// Opaque invocation, plus one per payload encoding byte
    pub const INVOKE: u64 = 50;
}

/// Read-only view handed to an executor for one action
pub struct ExecutionContext<'a> {
    /// State before the action, with the fee not yet charged
    pub state: &'a State,
    /// Account the action runs as
    pub sender: Address,
    /// Sender's current status
    pub account: &'a AccountStatus,
    /// Store for resolving state cells
    pub store: &'a dyn Store,
    /// Current ledger time
    pub timestamp: u64,
}

/// One state change requested by an executor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Move `amount` from the sender to `target`
    Transfer {
        /// Receiving account, created if absent
        target: Address,
        /// Amount moved
        amount: u64,
    },
    /// Set the sender's delegation to `peer`, settling the difference
    /// against the sender's balance
    Stake {
        /// Peer receiving the delegation
        peer: Address,
        /// New delegated amount
        amount: u64,
    },
    /// Queue `action` for the sender at `at`
    Schedule {
        /// Requested time; times not in the future run at the next tick
        at: u64,
        /// Deferred action
        action: Action,
    },
    /// Bind `key` to `value` in the sender's metadata
    SetMetadata {
        /// Metadata key
        key: Bytes,
        /// Stored value
        value: Cell,
    },
}

/// Ordered list of effects, applied all-or-nothing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDelta {
    effects: Vec<Effect>,
}

impl StateDelta {
    /// Empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta with a single effect
    pub fn single(effect: Effect) -> Self {
        Self {
            effects: vec![effect],
        }
    }

    /// Append an effect
    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Effects in application order
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Number of effects
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True if nothing changes
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// What an executor reports for one action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Returned value, or the error code to record
    pub result: Result<Cell, ErrorCode>,
    /// Juice consumed, charged whether or not the action succeeded
    pub juice: u64,
    /// Requested changes, discarded on error
    pub delta: StateDelta,
}

impl Outcome {
    /// Successful outcome
    pub fn ok(value: Cell, juice: u64, delta: StateDelta) -> Self {
        Self {
            result: Ok(value),
            juice,
            delta,
        }
    }

    /// Failed outcome; the juice is still charged
    pub fn error(code: ErrorCode, juice: u64) -> Self {
        Self {
            result: Err(code),
            juice,
            delta: StateDelta::new(),
        }
    }
}

/// Runs one action against a read-only state.
///
/// Executors never mutate state themselves: the applier charges the fee
/// and applies the returned [`StateDelta`]. An `Err` return is reserved for
/// store failures; anything the action itself gets wrong is an
/// [`Outcome::error`].
pub trait TransactionExecutor: Send + Sync {
    /// Execute `action` on behalf of `ctx.sender`
    fn execute(&self, ctx: &ExecutionContext<'_>, action: &Action) -> DataResult<Outcome>;
}

/// Bytes of memory allowance a metadata entry occupies
pub fn metadata_size(key: &[u8], value: &Cell) -> u64 {
    (key.len() + value.encoding().len()) as u64
}

/// Executor for the built-in actions
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeExecutor;

impl NativeExecutor {
    /// Create the executor
    pub fn new() -> Self {
        Self
    }

    fn set_metadata(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Bytes,
        value: &Cell,
    ) -> DataResult<Outcome> {
        let size = metadata_size(key, value);
        let cost = juice::SET.saturating_add(size);
        if key.len() > MAX_KEY_LENGTH {
            return Ok(Outcome::error(ErrorCode::BadFormat, cost));
        }
        let released = match ctx.account.metadata_value(key, ctx.store)? {
            Some(old) => metadata_size(key, &old),
            None => 0,
        };
        let usage = ctx.account.memory_usage.saturating_sub(released).saturating_add(size);
        if usage > ctx.account.memory_allowance {
            return Ok(Outcome::error(ErrorCode::Memory, cost));
        }
        let delta = StateDelta::single(Effect::SetMetadata {
            key: key.clone(),
            value: value.clone(),
        });
        Ok(Outcome::ok(value.clone(), cost, delta))
    }
}

impl TransactionExecutor for NativeExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>, action: &Action) -> DataResult<Outcome> {
        let outcome = match action {
            Action::Transfer { target, amount } => {
                if *amount > MAX_AMOUNT {
                    return Ok(Outcome::error(ErrorCode::BadFormat, juice::TRANSFER));
                }
                let delta = StateDelta::single(Effect::Transfer {
                    target: *target,
                    amount: *amount,
                });
                Outcome::ok(Cell::long(*amount as i64), juice::TRANSFER, delta)
            }
            Action::Stake { peer, amount } => {
                if *amount > MAX_AMOUNT {
                    return Ok(Outcome::error(ErrorCode::BadFormat, juice::STAKE));
                }
                if ctx.state.peer(peer, ctx.store)?.is_none() {
                    return Ok(Outcome::error(ErrorCode::State, juice::STAKE));
                }
                let delta = StateDelta::single(Effect::Stake {
                    peer: *peer,
                    amount: *amount,
                });
                Outcome::ok(Cell::long(*amount as i64), juice::STAKE, delta)
            }
            Action::Schedule { at, action } => {
                if *at > MAX_AMOUNT {
                    return Ok(Outcome::error(ErrorCode::BadFormat, juice::SCHEDULE));
                }
                let delta = StateDelta::single(Effect::Schedule {
                    at: *at,
                    action: action.as_ref().clone(),
                });
                Outcome::ok(Cell::long(*at as i64), juice::SCHEDULE, delta)
            }
            Action::SetMetadata { key, value } => self.set_metadata(ctx, key, value)?,
            Action::Invoke { payload } => {
                let cost = juice::INVOKE.saturating_add(payload.encoding().len() as u64);
                Outcome::ok(payload.clone(), cost, StateDelta::new())
            }
        };
        Ok(outcome)
    }
}
