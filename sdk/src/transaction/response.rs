//! What a successful submission hands back.

use serde::{Deserialize, Serialize};

use super::signed::TransactionHash;
use crate::client::Client;
use crate::error::Result;
use crate::identity::{AccountId, TransactionId};
use crate::receipt::{TransactionReceipt, TransactionReceiptQuery, TransactionRecord, TransactionRecordQuery};

/// Proof that a node accepted a transaction for processing.
///
/// Acceptance is not the outcome. Call [`get_receipt`](Self::get_receipt)
/// to wait for consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Account of the node that accepted the transaction.
    pub node_id: AccountId,
    pub transaction_id: TransactionId,
    /// Hash of exactly what `node_id` received.
    pub transaction_hash: TransactionHash,
}

impl TransactionResponse {
    /// A receipt query for this transaction that fails on any final status
    /// other than `SUCCESS`.
    pub fn receipt_query(&self) -> TransactionReceiptQuery {
        TransactionReceiptQuery::new(self.transaction_id).validate_status(true)
    }

    pub fn record_query(&self) -> TransactionRecordQuery {
        TransactionRecordQuery::new(self.transaction_id)
    }

    /// Polls until the transaction reaches consensus.
    ///
    /// A final status other than `SUCCESS` is returned as
    /// [`Error::ReceiptStatus`](crate::Error::ReceiptStatus).
    pub async fn get_receipt(&self, client: &Client) -> Result<TransactionReceipt> {
        self.receipt_query().execute(client).await
    }

    pub fn get_receipt_blocking(&self, client: &Client) -> Result<TransactionReceipt> {
        self.receipt_query().execute_blocking(client)
    }

    /// Waits for a successful receipt, then fetches the full record.
    pub async fn get_record(&self, client: &Client) -> Result<TransactionRecord> {
        self.record_query().execute(client).await
    }

    pub fn get_record_blocking(&self, client: &Client) -> Result<TransactionRecord> {
        self.record_query().execute_blocking(client)
    }
}
