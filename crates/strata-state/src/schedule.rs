//! Schedule keys and entries
//!
//! Deferred actions are keyed by `timestamp (8 bytes BE) ++ owner address`,
//! so the map's ascending key order is execution order: earlier times
//! first, ties broken by address. Each key holds a vector of actions in the
//! order they were scheduled.

use strata_data::{DataError, DataResult};
use strata_primitives::Address;
use strata_types::Action;

/// Length of a schedule key
pub const SCHEDULE_KEY_LEN: usize = 8 + Address::LEN;

/// Build the schedule key for `owner` at time `at`
pub fn schedule_key(at: u64, owner: &Address) -> [u8; SCHEDULE_KEY_LEN] {
    let mut key = [0u8; SCHEDULE_KEY_LEN];
    key[..8].copy_from_slice(&at.to_be_bytes());
    key[8..].copy_from_slice(owner.as_bytes());
    key
}

/// Split a schedule key into time and owner
pub fn parse_schedule_key(key: &[u8]) -> DataResult<(u64, Address)> {
    if key.len() != SCHEDULE_KEY_LEN {
        return Err(DataError::bad_format(format!(
            "schedule key of {} bytes",
            key.len()
        )));
    }
    let mut at = [0u8; 8];
    at.copy_from_slice(&key[..8]);
    let owner = Address::from_slice(&key[8..]).map_err(|e| DataError::bad_format(e.to_string()))?;
    Ok((u64::from_be_bytes(at), owner))
}

/// Actions due for one owner at one time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledEntry {
    /// Scheduled time
    pub at: u64,
    /// Account the actions run as
    pub owner: Address,
    /// Actions in scheduling order
    pub actions: Vec<Action>,
}
