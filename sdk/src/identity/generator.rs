//! Collision-free transaction id generation.
//!
//! Two requests from the same payer must never share a `TransactionId`:
//! nodes treat the second as a duplicate and reject it. Wall clocks are
//! coarse and can be read twice within the same tick, so the generator keeps
//! a per-payer high-water mark and bumps any candidate that does not move
//! strictly past it by one nanosecond.
//!
//! The marks live in a `DashMap`, so generating ids for different payers
//! never contends, and the read-compare-store for one payer happens under
//! that payer's shard lock.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::entity_id::AccountId;
use super::timestamp::Timestamp;
use super::transaction_id::TransactionId;

/// Source of valid-start candidates.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that reports whatever it was last set to. For tests and for
/// reproducing ids offline.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Issues transaction ids that strictly increase per payer.
#[derive(Debug)]
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    last_issued: DashMap<AccountId, Timestamp>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_issued: DashMap::new(),
        }
    }

    /// Generates a fresh id for `payer` with a valid start of "now", bumped
    /// past the last id issued for this payer if needed.
    pub fn generate(&self, payer: AccountId) -> TransactionId {
        let candidate = self.clock.now();

        let valid_start = match self.last_issued.entry(payer) {
            Entry::Occupied(mut last) => {
                let next = if candidate > *last.get() {
                    candidate
                } else {
                    last.get().plus_nanos(1)
                };
                last.insert(next);
                next
            }
            Entry::Vacant(slot) => *slot.insert(candidate),
        };

        TransactionId::with_valid_start(payer, valid_start)
    }

    /// Valid start of the most recent id issued for `payer`, if any.
    pub fn last_issued(&self, payer: &AccountId) -> Option<Timestamp> {
        self.last_issued.get(payer).map(|entry| *entry)
    }
}
