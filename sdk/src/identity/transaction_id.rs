//! Transaction identities.
//!
//! A [`TransactionId`] names one logical request for its whole life: it is
//! the idempotency key a node uses to reject duplicates, it is embedded in
//! the signed body, and it is the lookup key for receipt and record polling.
//!
//! ## Canonical string form
//!
//! ```text
//! shard.realm.num@seconds.nanos[?scheduled][/nonce]
//! 0.0.23847@1700000000.000000042?scheduled/3
//! ```
//!
//! The nanosecond field is always rendered with nine digits so that string
//! comparison of two ids from the same payer agrees with time ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use super::entity_id::AccountId;
use super::timestamp::{Timestamp, NANOS_PER_SECOND};
use super::{parse_digits, IdError};

const SCHEDULED_SUFFIX: &str = "scheduled";

/// Identity of a single transaction.
///
/// Fields are private: an id is immutable once issued, and the `with_*`
/// methods return modified copies. Changing an id after signing would
/// invalidate the signature, so nothing here mutates in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    payer: Option<AccountId>,
    valid_start: Option<Timestamp>,
    nonce: Option<u32>,
    scheduled: bool,
}

impl TransactionId {
    /// An id with an explicit valid-start time. Used for deterministic ids in
    /// tests and to re-derive the id of a scheduled transaction.
    pub fn with_valid_start(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            payer: Some(payer),
            valid_start: Some(valid_start),
            nonce: None,
            scheduled: false,
        }
    }

    /// An id with neither payer nor valid start. Such ids cannot be
    /// submitted; they exist so partially-decoded wire values can still be
    /// represented and ordered.
    pub fn empty() -> Self {
        Self {
            payer: None,
            valid_start: None,
            nonce: None,
            scheduled: false,
        }
    }

    /// Returns a copy with the given payer.
    pub fn with_payer(mut self, payer: Option<AccountId>) -> Self {
        self.payer = payer;
        self
    }

    /// Returns a copy with the given valid-start time.
    pub fn with_start(mut self, valid_start: Option<Timestamp>) -> Self {
        self.valid_start = valid_start;
        self
    }

    /// Returns a copy with the given nonce. A nonce distinguishes child
    /// transactions that share the parent's payer and valid start.
    pub fn with_nonce(mut self, nonce: Option<u32>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Returns a copy with the scheduled flag set or cleared.
    pub fn with_scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    pub fn payer(&self) -> Option<AccountId> {
        self.payer
    }

    pub fn valid_start(&self) -> Option<Timestamp> {
        self.valid_start
    }

    pub fn nonce(&self) -> Option<u32> {
        self.nonce
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// True when both payer and valid start are present, i.e. the id can be
    /// rendered canonically and submitted.
    pub fn is_complete(&self) -> bool {
        self.payer.is_some() && self.valid_start.is_some()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Missing parts sort low: unscheduled before scheduled, then payer-less
/// before payer, then by payer, then start-less before start, then by start.
/// Nonce is the final tiebreak so that `Ord` agrees with `Eq`.
impl Ord for TransactionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scheduled
            .cmp(&other.scheduled)
            .then_with(|| missing_sorts_low(&self.payer, &other.payer))
            .then_with(|| missing_sorts_low(&self.valid_start, &other.valid_start))
            .then_with(|| missing_sorts_low(&self.nonce, &other.nonce))
    }
}

impl PartialOrd for TransactionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn missing_sorts_low<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// String form
// ---------------------------------------------------------------------------

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payer {
            Some(payer) => write!(f, "{payer}")?,
            None => f.write_str("<no payer>")?,
        }
        match self.valid_start {
            Some(start) => write!(f, "@{start}")?,
            None => f.write_str("@<no valid start>")?,
        }
        if self.scheduled {
            write!(f, "?{SCHEDULED_SUFFIX}")?;
        }
        if let Some(nonce) = self.nonce {
            write!(f, "/{nonce}")?;
        }
        Ok(())
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, nonce) = match s.split_once('/') {
            Some((rest, nonce)) => {
                let nonce = parse_digits::<u32>(nonce)
                    .ok_or_else(|| IdError::unparsable(s, "nonce is not a u32"))?;
                (rest, Some(nonce))
            }
            None => (s, None),
        };

        let (rest, scheduled) = match rest.split_once('?') {
            Some((rest, SCHEDULED_SUFFIX)) => (rest, true),
            Some(_) => return Err(IdError::unparsable(s, "unknown '?' suffix")),
            None => (rest, false),
        };

        let (payer, start) = rest
            .split_once('@')
            .ok_or_else(|| IdError::unparsable(s, "expected '@' between payer and valid start"))?;

        let payer: AccountId = payer
            .parse()
            .map_err(|_| IdError::unparsable(s, "payer is not shard.realm.num"))?;

        let (seconds, nanos) = start
            .split_once('.')
            .ok_or_else(|| IdError::unparsable(s, "expected seconds.nanos"))?;

        let seconds = parse_digits::<i64>(seconds)
            .ok_or_else(|| IdError::unparsable(s, "seconds is not numeric"))?;
        let nanos = parse_digits::<u32>(nanos)
            .filter(|n| *n < NANOS_PER_SECOND)
            .ok_or_else(|| IdError::unparsable(s, "nanos is not in 0..1000000000"))?;

        Ok(Self {
            payer: Some(payer),
            valid_start: Some(Timestamp::new(seconds, nanos)),
            nonce,
            scheduled,
        })
    }
}


impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.is_complete() {
            return Err(ser::Error::custom("cannot serialize an incomplete transaction id"));
        }
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
