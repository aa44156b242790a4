//! Transaction construction and submission.
//!
//! A [`Transaction`] collects what the caller wants done. [`Transaction::freeze`]
//! fixes its identity against a client and yields a [`FrozenTransaction`],
//! which is what the execution engine drives. Nothing node-specific is
//! decided until dispatch: every attempt rebuilds the body for the node it
//! is going to and signs it afresh.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::body::{DomainRequest, TransactionBody, TransactionData};
use super::response::TransactionResponse;
use super::signed::SignedTransaction;
use crate::client::Client;
use crate::config::{DEFAULT_MAX_TRANSACTION_FEE, DEFAULT_VALID_DURATION_SECS, MAX_MEMO_LENGTH};
use crate::crypto::Signer;
use crate::error::{Error, Result};
use crate::execute::{self, ExecuteOptions, Executable, ExecutionState};
use crate::identity::{AccountId, IdError, TransactionId};
use crate::network::{WireRequest, WireResponse};
use crate::status::{Disposition, SUBMIT};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An unfrozen transaction.
#[derive(Clone)]
pub struct Transaction {
    data: TransactionData,
    memo: String,
    max_fee: u64,
    valid_duration_secs: u64,
    transaction_id: Option<TransactionId>,
    node_account_ids: Vec<AccountId>,
    signers: Vec<Arc<dyn Signer>>,
    max_attempts: Option<u32>,
}

impl Transaction {
    pub fn new(data: TransactionData) -> Self {
        Self {
            data,
            memo: String::new(),
            max_fee: DEFAULT_MAX_TRANSACTION_FEE,
            valid_duration_secs: DEFAULT_VALID_DURATION_SECS,
            transaction_id: None,
            node_account_ids: Vec::new(),
            signers: Vec::new(),
            max_attempts: None,
        }
    }

    /// A domain operation carrying `payload` inline.
    pub fn domain(kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::new(TransactionData::Domain(DomainRequest::inline(kind, payload)))
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn max_fee(mut self, max_fee: u64) -> Self {
        self.max_fee = max_fee;
        self
    }

    pub fn valid_duration_secs(mut self, secs: u64) -> Self {
        self.valid_duration_secs = secs;
        self
    }

    /// Uses `id` instead of generating one for the operator at freeze time.
    pub fn transaction_id(mut self, id: TransactionId) -> Self {
        self.transaction_id = Some(id);
        self
    }

    /// Restricts submission to these node accounts.
    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = ids.into_iter().collect();
        self
    }

    /// Adds a signer on top of the operator.
    pub fn sign_with(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    /// Fixes the transaction id and signer set.
    ///
    /// The id comes from the builder if one was set, otherwise it is
    /// generated for the client's operator. The operator, when present,
    /// always signs first.
    pub fn freeze(self, client: &Client) -> Result<FrozenTransaction> {
        if self.memo.len() > MAX_MEMO_LENGTH {
            return Err(Error::MemoTooLong {
                len: self.memo.len(),
                max: MAX_MEMO_LENGTH,
            });
        }

        let transaction_id = match self.transaction_id {
            Some(id) if !id.is_complete() => return Err(IdError::Incomplete.into()),
            Some(id) => id,
            None => client.generate_transaction_id()?,
        };

        for account in &self.node_account_ids {
            if client.registry().node_for_account(*account).is_none() {
                return Err(Error::UnknownNode(account.to_string()));
            }
        }

        let mut signers = Vec::with_capacity(self.signers.len() + 1);
        if let Some(operator) = client.operator() {
            signers.push(Arc::clone(&operator.signer));
        }
        signers.extend(self.signers);
        if signers.is_empty() {
            return Err(Error::NoOperator("sign transactions"));
        }

        debug!(
            transaction_id = %transaction_id,
            data = self.data.label(),
            signers = signers.len(),
            "transaction frozen"
        );

        Ok(FrozenTransaction {
            transaction_id,
            data: self.data,
            memo: self.memo,
            max_fee: self.max_fee,
            valid_duration_secs: self.valid_duration_secs,
            node_account_ids: self.node_account_ids,
            signers,
            max_attempts: self.max_attempts,
        })
    }

    /// Freezes against `client` and submits.
    pub async fn execute(self, client: &Client) -> Result<TransactionResponse> {
        self.freeze(client)?.execute(client).await
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("data", &self.data.label())
            .field("memo", &self.memo)
            .field("transaction_id", &self.transaction_id)
            .field("node_account_ids", &self.node_account_ids)
            .field("extra_signers", &self.signers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FrozenTransaction
// ---------------------------------------------------------------------------

/// A transaction with a fixed id, ready to submit any number of times.
#[derive(Clone)]
pub struct FrozenTransaction {
    transaction_id: TransactionId,
    data: TransactionData,
    memo: String,
    max_fee: u64,
    valid_duration_secs: u64,
    node_account_ids: Vec<AccountId>,
    signers: Vec<Arc<dyn Signer>>,
    max_attempts: Option<u32>,
}

impl FrozenTransaction {
    pub fn id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    /// The body this transaction would carry to `node_account_id`.
    pub fn body_for(&self, node_account_id: AccountId) -> TransactionBody {
        TransactionBody {
            transaction_id: self.transaction_id,
            node_account_id,
            max_fee: self.max_fee,
            valid_duration_secs: self.valid_duration_secs,
            memo: self.memo.clone(),
            data: self.data.clone(),
        }
    }

    pub async fn execute(&self, client: &Client) -> Result<TransactionResponse> {
        execute::execute(self, client, ExecuteOptions::default()).await
    }

    pub async fn execute_with(&self, client: &Client, options: ExecuteOptions) -> Result<TransactionResponse> {
        execute::execute(self, client, options).await
    }

    /// Submits from synchronous code. Fails with [`Error::Internal`] when
    /// called on a runtime thread.
    pub fn execute_blocking(&self, client: &Client) -> Result<TransactionResponse> {
        execute::execute_blocking(self, client, ExecuteOptions::default())
    }
}

impl Executable for FrozenTransaction {
    type Output = TransactionResponse;

    fn label(&self) -> &'static str {
        "submit"
    }

    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    fn make_request(&self, _client: &Client, node_account_id: AccountId) -> Result<WireRequest> {
        let body = self.body_for(node_account_id);
        debug!(
            request = "submit",
            node = %node_account_id,
            state = %ExecutionState::Signing,
            "execution state"
        );
        let signed = SignedTransaction::sign(body, &self.signers)?;
        Ok(WireRequest::SubmitTransaction(signed))
    }

    fn classify(&self, response: &WireResponse) -> Disposition {
        SUBMIT.classify(response.precheck)
    }

    fn map_response(
        &self,
        _response: WireResponse,
        node_account_id: AccountId,
        request: &WireRequest,
    ) -> Result<TransactionResponse> {
        let WireRequest::SubmitTransaction(signed) = request else {
            return Err(Error::Internal(format!(
                "submit produced a {} request",
                request.label()
            )));
        };
        Ok(TransactionResponse {
            node_id: node_account_id,
            transaction_id: self.transaction_id,
            transaction_hash: signed.transaction_hash(),
        })
    }

    fn map_status_error(&self, response: &WireResponse) -> Error {
        Error::PrecheckStatus {
            transaction_id: self.transaction_id,
            status: response.precheck,
        }
    }

    fn max_attempts(&self, client: &Client) -> u32 {
        self.max_attempts
            .unwrap_or(client.execution_config().max_attempts)
    }
}

impl fmt::Debug for FrozenTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenTransaction")
            .field("transaction_id", &self.transaction_id)
            .field("data", &self.data.label())
            .field("node_account_ids", &self.node_account_ids)
            .field("signers", &self.signers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Signer;
    use crate::identity::{EntityId, Timestamp};
    use crate::mock::MockNetwork;
    use crate::status::Status;

    fn client_with_operator(operator: bool) -> Client {
        let mock = MockNetwork::new();
        let mut builder = Client::builder()
            .network([("node-0:50211".to_string(), EntityId::from_num(3))])
            .channel_factory(Arc::new(mock));
        if operator {
            builder = builder.operator(
                EntityId::from_num(1001),
                Arc::new(Ed25519Signer::from_seed(&[7; 32])),
            );
        }
        builder.build().unwrap()
    }

    #[test]
    fn freeze_generates_id_for_operator() {
        let client = client_with_operator(true);
        let frozen = Transaction::domain("contract_call", vec![1]).freeze(&client).unwrap();
        assert_eq!(frozen.id().payer(), Some(EntityId::from_num(1001)));
    }

    #[test]
    fn freeze_without_operator_or_id_fails() {
        let client = client_with_operator(false);
        let err = Transaction::domain("k", vec![]).freeze(&client).unwrap_err();
        assert!(matches!(err, Error::NoOperator(_)));
    }

    #[test]
    fn explicit_id_with_extra_signer_needs_no_operator() {
        let client = client_with_operator(false);
        let id = TransactionId::with_valid_start(EntityId::from_num(5), Timestamp::new(1, 0));
        let frozen = Transaction::domain("k", vec![])
            .transaction_id(id)
            .sign_with(Arc::new(Ed25519Signer::from_seed(&[1; 32])))
            .freeze(&client)
            .unwrap();
        assert_eq!(frozen.id(), id);
    }

    #[test]
    fn incomplete_id_is_rejected() {
        let client = client_with_operator(true);
        let err = Transaction::domain("k", vec![])
            .transaction_id(TransactionId::empty())
            .freeze(&client)
            .unwrap_err();
        assert!(matches!(err, Error::Id(IdError::Incomplete)));
    }

    #[test]
    fn long_memo_is_rejected() {
        let client = client_with_operator(true);
        let err = Transaction::domain("k", vec![])
            .memo("m".repeat(MAX_MEMO_LENGTH + 1))
            .freeze(&client)
            .unwrap_err();
        assert!(matches!(err, Error::MemoTooLong { .. }));
    }

    #[test]
    fn unknown_pinned_node_is_rejected() {
        let client = client_with_operator(true);
        let err = Transaction::domain("k", vec![])
            .node_account_ids([EntityId::from_num(99)])
            .freeze(&client)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn each_node_gets_its_own_signed_body() {
        let client = client_with_operator(true);
        let frozen = Transaction::domain("k", vec![9]).freeze(&client).unwrap();
        let a = frozen.make_request(&client, EntityId::from_num(3)).unwrap();
        let b = frozen.make_request(&client, EntityId::from_num(4)).unwrap();
        let (WireRequest::SubmitTransaction(a), WireRequest::SubmitTransaction(b)) = (a, b) else {
            panic!("expected submit requests");
        };
        assert!(a.verify_signatures());
        assert!(b.verify_signatures());
        assert_eq!(a.body.transaction_id, b.body.transaction_id);
        assert_ne!(a.transaction_hash(), b.transaction_hash());
    }

    #[test]
    fn submit_classification() {
        let client = client_with_operator(true);
        let frozen = Transaction::domain("k", vec![]).freeze(&client).unwrap();
        assert_eq!(frozen.classify(&WireResponse::precheck(Status::Ok)), Disposition::Success);
        assert_eq!(frozen.classify(&WireResponse::precheck(Status::Busy)), Disposition::Retry);
        assert_eq!(
            frozen.classify(&WireResponse::precheck(Status::InvalidSignature)),
            Disposition::Terminal
        );
    }
}
