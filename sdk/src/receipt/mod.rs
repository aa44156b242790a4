//! # Receipts & Records
//!
//! A submitted transaction is only *accepted*; its outcome is decided by
//! consensus some time later. This module polls for that outcome.
//!
//! ## Poll State Machine
//!
//! ```text
//!   poll ─▶ precheck retriable (BUSY, RECEIPT_NOT_FOUND, ...) ─▶ wait, poll again
//!        ─▶ precheck terminal (INVALID_TRANSACTION_ID, ...)   ─▶ PrecheckStatus error
//!        ─▶ precheck OK, consensus pending (UNKNOWN, OK, ...)  ─▶ wait, poll again
//!        ─▶ precheck OK, consensus final                       ─▶ receipt
//! ```
//!
//! Waits follow [`PollConfig`](crate::config::PollConfig): the first poll is
//! immediate, later ones back off linearly. Polling is bounded both by
//! attempt count and by wall-clock time; running out of either is a
//! timeout, never a node-reported failure.
//!
//! Records are fetched only after a successful receipt.

pub mod query;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::identity::{EntityId, Timestamp, TransactionId};
use crate::status::Status;

pub use query::{TransactionReceiptQuery, TransactionRecordQuery};

/// The consensus outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,

    /// Final consensus status. `SUCCESS` when the transaction took effect.
    pub status: Status,

    /// Entity created by the transaction, such as a blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,

    /// Result bytes the transaction produced, if any.
    #[serde(default, with = "crate::encoding::hex_bytes")]
    pub payload: Bytes,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// A receipt plus the details the network kept about the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub receipt: TransactionReceipt,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<Timestamp>,

    /// Result bytes produced by the transaction, if any.
    #[serde(default, with = "crate::encoding::hex_bytes")]
    pub payload: Bytes,
}
