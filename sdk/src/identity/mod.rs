//! # Identity Module
//!
//! Names for things on the network and for the requests sent to it.
//!
//! 1. **EntityId**: `shard.realm.num` addresses for accounts, nodes and
//!    blobs. Totally ordered, value-compared.
//! 2. **Timestamp**: seconds + nanoseconds valid-start times.
//! 3. **TransactionId**: payer + valid start (+ nonce, scheduled flag). The
//!    idempotency key for submission and the lookup key for receipts.
//! 4. **IdGenerator**: per-payer monotonic id issuance with a pluggable
//!    [`Clock`].
//!
//! ## Design Decisions
//!
//! - Uniqueness is enforced at generation time, in process, with a per-payer
//!   high-water mark. Nothing is persisted; two processes sharing a payer
//!   must coordinate themselves.
//! - Ids whose payer or valid start is missing still order deterministically
//!   (missing parts sort low) but cannot be rendered canonically or
//!   serialized.

pub mod entity_id;
pub mod generator;
pub mod timestamp;
pub mod transaction_id;

use std::str::FromStr;

use thiserror::Error;

pub use entity_id::{AccountId, BlobId, EntityId};
pub use generator::{Clock, FixedClock, IdGenerator, SystemClock};
pub use timestamp::Timestamp;
pub use transaction_id::TransactionId;

/// Errors raised while parsing or using identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The input is not in canonical form.
    #[error("unparsable identity {input:?}: {reason}")]
    Unparsable {
        /// The rejected input, verbatim.
        input: String,
        /// Which part of the grammar it violated.
        reason: &'static str,
    },

    /// A transaction id without a payer or a valid start was used where a
    /// complete one is required.
    #[error("transaction id is missing its payer or valid start")]
    Incomplete,
}

impl IdError {
    pub(crate) fn unparsable(input: &str, reason: &'static str) -> Self {
        Self::Unparsable {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parses a plain run of ASCII digits. `str::parse` would also accept a
/// leading `+`, which has no place in the canonical form.
pub(crate) fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
