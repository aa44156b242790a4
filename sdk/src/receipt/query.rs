//! Receipt and record queries, driven by the execution engine.

use std::time::Duration;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::execute::{self, Budget, ExecuteOptions, Executable};
use crate::identity::{AccountId, TransactionId};
use crate::network::{WireRequest, WireResponse};
use crate::status::{Disposition, Status, RECEIPT_CONSENSUS, RECEIPT_PRECHECK};

use super::{TransactionReceipt, TransactionRecord};

// ---------------------------------------------------------------------------
// Shared classification
// ---------------------------------------------------------------------------

/// Precheck first; a clean precheck hands over to the consensus status. A
/// reply without a consensus status is still pending.
fn classify_poll(response: &WireResponse) -> Disposition {
    match RECEIPT_PRECHECK.classify(response.precheck) {
        Disposition::Success => match response.consensus_status {
            Some(status) => RECEIPT_CONSENSUS.classify(status),
            None => Disposition::Retry,
        },
        other => other,
    }
}

fn poll_error(transaction_id: TransactionId, response: &WireResponse) -> Error {
    if response.precheck != Status::Ok {
        return Error::PrecheckStatus {
            transaction_id,
            status: response.precheck,
        };
    }
    Error::ReceiptStatus {
        transaction_id,
        status: response.consensus_status.unwrap_or(Status::Unknown),
    }
}

fn receipt_from(transaction_id: TransactionId, response: &WireResponse) -> Result<TransactionReceipt> {
    let status = response
        .consensus_status
        .ok_or_else(|| Error::MalformedResponse("receipt without a consensus status".into()))?;
    Ok(TransactionReceipt {
        transaction_id,
        status,
        entity_id: response.entity_id,
        payload: response.payload.clone(),
    })
}

fn poll_attempts(client: &Client) -> u32 {
    client.poll_config().max_attempts
}

fn poll_delay(attempt: u32, client: &Client) -> Duration {
    client.poll_config().delay_for(attempt)
}

fn poll_timeout(client: &Client) -> Duration {
    client.poll_config().timeout()
}

// ---------------------------------------------------------------------------
// TransactionReceiptQuery
// ---------------------------------------------------------------------------

/// Polls for a transaction's receipt.
///
/// By default any final status is returned as a receipt. With
/// [`validate_status`](Self::validate_status) set, anything other than
/// `SUCCESS` becomes [`Error::ReceiptStatus`].
#[derive(Debug, Clone)]
pub struct TransactionReceiptQuery {
    transaction_id: TransactionId,
    node_account_ids: Vec<AccountId>,
    validate_status: bool,
}

impl TransactionReceiptQuery {
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            node_account_ids: Vec::new(),
            validate_status: false,
        }
    }

    pub fn validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }

    /// Asks only these nodes.
    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = ids.into_iter().collect();
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<TransactionReceipt> {
        execute::execute(self, client, ExecuteOptions::default()).await
    }

    pub async fn execute_with(&self, client: &Client, options: ExecuteOptions) -> Result<TransactionReceipt> {
        execute::execute(self, client, options).await
    }

    pub fn execute_blocking(&self, client: &Client) -> Result<TransactionReceipt> {
        execute::execute_blocking(self, client, ExecuteOptions::default())
    }
}

impl Executable for TransactionReceiptQuery {
    type Output = TransactionReceipt;

    fn label(&self) -> &'static str {
        "get_receipt"
    }

    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    fn make_request(&self, _client: &Client, _node_account_id: AccountId) -> Result<WireRequest> {
        Ok(WireRequest::GetReceipt {
            transaction_id: self.transaction_id,
        })
    }

    fn classify(&self, response: &WireResponse) -> Disposition {
        classify_poll(response)
    }

    fn map_response(
        &self,
        response: WireResponse,
        _node_account_id: AccountId,
        _request: &WireRequest,
    ) -> Result<TransactionReceipt> {
        let receipt = receipt_from(self.transaction_id, &response)?;
        if self.validate_status && !receipt.is_success() {
            return Err(Error::ReceiptStatus {
                transaction_id: self.transaction_id,
                status: receipt.status,
            });
        }
        Ok(receipt)
    }

    fn map_status_error(&self, response: &WireResponse) -> Error {
        poll_error(self.transaction_id, response)
    }

    fn max_attempts(&self, client: &Client) -> u32 {
        poll_attempts(client)
    }

    fn retry_delay(&self, attempt: u32, client: &Client) -> Duration {
        poll_delay(attempt, client)
    }

    fn request_timeout(&self, client: &Client) -> Duration {
        poll_timeout(client)
    }
}

// ---------------------------------------------------------------------------
// TransactionRecordQuery
// ---------------------------------------------------------------------------

/// Fetches a transaction's record.
///
/// [`execute`](Self::execute) waits for a successful receipt before asking
/// for the record, so a failed transaction surfaces as
/// [`Error::ReceiptStatus`]. Driving the query through the engine directly
/// skips that wait and polls the record alone.
#[derive(Debug, Clone)]
pub struct TransactionRecordQuery {
    transaction_id: TransactionId,
    node_account_ids: Vec<AccountId>,
}

impl TransactionRecordQuery {
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            node_account_ids: Vec::new(),
        }
    }

    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = ids.into_iter().collect();
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<TransactionRecord> {
        self.execute_with(client, ExecuteOptions::default()).await
    }

    /// `options.timeout` bounds the receipt wait and the record poll
    /// together.
    pub async fn execute_with(&self, client: &Client, options: ExecuteOptions) -> Result<TransactionRecord> {
        let budget = Budget::new(options);
        TransactionReceiptQuery::new(self.transaction_id)
            .node_account_ids(self.node_account_ids.iter().copied())
            .validate_status(true)
            .execute_with(client, budget.options(poll_timeout(client))?)
            .await?;
        execute::execute(self, client, budget.options(poll_timeout(client))?).await
    }

    pub fn execute_blocking(&self, client: &Client) -> Result<TransactionRecord> {
        execute::block_on(self.execute(client))
    }
}

impl Executable for TransactionRecordQuery {
    type Output = TransactionRecord;

    fn label(&self) -> &'static str {
        "get_record"
    }

    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    fn make_request(&self, _client: &Client, _node_account_id: AccountId) -> Result<WireRequest> {
        Ok(WireRequest::GetRecord {
            transaction_id: self.transaction_id,
        })
    }

    fn classify(&self, response: &WireResponse) -> Disposition {
        classify_poll(response)
    }

    fn map_response(
        &self,
        response: WireResponse,
        _node_account_id: AccountId,
        _request: &WireRequest,
    ) -> Result<TransactionRecord> {
        Ok(TransactionRecord {
            receipt: receipt_from(self.transaction_id, &response)?,
            consensus_timestamp: response.consensus_timestamp,
            payload: response.payload,
        })
    }

    fn map_status_error(&self, response: &WireResponse) -> Error {
        poll_error(self.transaction_id, response)
    }

    fn max_attempts(&self, client: &Client) -> u32 {
        poll_attempts(client)
    }

    fn retry_delay(&self, attempt: u32, client: &Client) -> Duration {
        poll_delay(attempt, client)
    }

    fn request_timeout(&self, client: &Client) -> Duration {
        poll_timeout(client)
    }
}
