//! # In-Process Mock Network
//!
//! A [`ChannelFactory`] whose channels never leave the process. Used by the
//! test suites and handy for exercising application code offline.
//!
//! Each call is answered by the first of these that applies:
//!
//! 1. the address was marked [`unreachable`](MockNetwork::set_unreachable):
//!    `Unavailable`;
//! 2. a reply queued for that address with
//!    [`push_for`](MockNetwork::push_for);
//! 3. a reply queued for any address with [`push`](MockNetwork::push);
//! 4. the built-in ledger.
//!
//! The ledger accepts correctly signed submissions, applies blob
//! create/append/delete and domain operations immediately, and serves
//! receipts and records for them. A domain operation's record payload is
//! the full payload it was given, whether inline or read from a blob.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::trace;

use crate::identity::{BlobId, EntityId, Timestamp, TransactionId};
use crate::network::{Channel, ChannelFactory, TransportError, WireRequest, WireResponse};
use crate::status::Status;
use crate::transaction::{SignedTransaction, TransactionBody, TransactionData};

/// First number handed out to blobs the ledger creates.
const FIRST_BLOB_NUM: u64 = 5000;

/// A scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(WireResponse),
    Fail(TransportError),
    /// Never answers. Useful for deadline and cancellation tests.
    Hang,
}

impl From<WireResponse> for MockReply {
    fn from(response: WireResponse) -> Self {
        Self::Respond(response)
    }
}

impl From<TransportError> for MockReply {
    fn from(err: TransportError) -> Self {
        Self::Fail(err)
    }
}

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub address: String,
    pub request: WireRequest,
}

/// Overrides the consensus status the ledger assigns to a submission.
/// Returning `None` lets the ledger apply it normally.
pub type ConsensusRule = dyn Fn(&TransactionBody) -> Option<Status> + Send + Sync;

#[derive(Debug, Clone)]
struct Outcome {
    status: Status,
    entity_id: Option<EntityId>,
    consensus_timestamp: Timestamp,
    payload: Bytes,
}

#[derive(Default)]
struct Ledger {
    blobs: BTreeMap<BlobId, BytesMut>,
    outcomes: HashMap<TransactionId, Outcome>,
    accepted: Vec<TransactionBody>,
    next_blob: u64,
    consensus_seconds: i64,
}

impl Ledger {
    fn submit(&mut self, signed: SignedTransaction, rule: Option<&ConsensusRule>) -> WireResponse {
        let id = signed.body.transaction_id;
        if !signed.verify_signatures() {
            return WireResponse::precheck(Status::InvalidSignature);
        }
        if self.outcomes.contains_key(&id) {
            return WireResponse::precheck(Status::DuplicateTransaction);
        }

        let body = signed.body;
        let outcome = match rule.and_then(|rule| rule(&body)) {
            Some(status) => self.outcome(status, None, Bytes::new()),
            None => self.apply(&body.data),
        };
        trace!(transaction_id = %id, status = %outcome.status, "mock ledger applied transaction");
        self.outcomes.insert(id, outcome);
        self.accepted.push(body);
        WireResponse::precheck(Status::Ok)
    }

    fn apply(&mut self, data: &TransactionData) -> Outcome {
        match data {
            TransactionData::BlobCreate { contents } => {
                let id = EntityId::from_num(FIRST_BLOB_NUM + self.next_blob);
                self.next_blob += 1;
                self.blobs.insert(id, BytesMut::from(&contents[..]));
                self.outcome(Status::Success, Some(id), Bytes::new())
            }
            TransactionData::BlobAppend { blob_id, contents } => match self.blobs.get_mut(blob_id) {
                Some(blob) => {
                    blob.extend_from_slice(contents);
                    self.outcome(Status::Success, None, Bytes::new())
                }
                None => self.outcome(Status::InvalidFileId, None, Bytes::new()),
            },
            TransactionData::BlobDelete { blob_id } => match self.blobs.remove(blob_id) {
                Some(_) => self.outcome(Status::Success, None, Bytes::new()),
                None => self.outcome(Status::InvalidFileId, None, Bytes::new()),
            },
            TransactionData::Domain(request) => match request.blob {
                Some(blob_id) => match self.blobs.get(&blob_id) {
                    Some(blob) => {
                        let payload = Bytes::copy_from_slice(blob);
                        self.outcome(Status::Success, None, payload)
                    }
                    None => self.outcome(Status::InvalidFileId, None, Bytes::new()),
                },
                None => self.outcome(Status::Success, None, request.inline.clone()),
            },
        }
    }

    fn outcome(&mut self, status: Status, entity_id: Option<EntityId>, payload: Bytes) -> Outcome {
        self.consensus_seconds += 1;
        Outcome {
            status,
            entity_id,
            consensus_timestamp: Timestamp::new(1_700_000_000 + self.consensus_seconds, 0),
            payload,
        }
    }

    fn receipt(&self, id: &TransactionId, with_record: bool) -> WireResponse {
        let Some(outcome) = self.outcomes.get(id) else {
            let missing = if with_record {
                Status::RecordNotFound
            } else {
                Status::ReceiptNotFound
            };
            return WireResponse::precheck(missing);
        };
        let mut response = WireResponse::receipt(outcome.status).with_payload(outcome.payload.clone());
        response.entity_id = outcome.entity_id;
        if with_record {
            response = response.with_consensus_timestamp(outcome.consensus_timestamp);
        }
        response
    }
}

#[derive(Default)]
struct MockState {
    by_address: Mutex<HashMap<String, VecDeque<MockReply>>>,
    any: Mutex<VecDeque<MockReply>>,
    unreachable: Mutex<HashSet<String>>,
    calls: Mutex<Vec<MockCall>>,
    ledger: Mutex<Ledger>,
    rule: Mutex<Option<Arc<ConsensusRule>>>,
    opened: AtomicUsize,
}

/// Shared handle to a mock network. Clones see the same state.
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Arc<MockState>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next call to any node.
    pub fn push(&self, reply: impl Into<MockReply>) -> &Self {
        self.state.any.lock().push_back(reply.into());
        self
    }

    /// Queues a reply for the next call to `address`.
    pub fn push_for(&self, address: &str, reply: impl Into<MockReply>) -> &Self {
        self.state
            .by_address
            .lock()
            .entry(address.to_string())
            .or_default()
            .push_back(reply.into());
        self
    }

    /// Every call to `address` fails with `Unavailable` until cleared.
    pub fn set_unreachable(&self, address: &str) {
        self.state.unreachable.lock().insert(address.to_string());
    }

    pub fn clear_unreachable(&self, address: &str) {
        self.state.unreachable.lock().remove(address);
    }

    pub fn set_consensus_rule<F>(&self, rule: F)
    where
        F: Fn(&TransactionBody) -> Option<Status> + Send + Sync + 'static,
    {
        *self.state.rule.lock() = Some(Arc::new(rule));
    }

    pub fn clear_consensus_rule(&self) {
        *self.state.rule.lock() = None;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    /// Addresses called, in order.
    pub fn called_addresses(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .iter()
            .map(|call| call.address.clone())
            .collect()
    }

    /// Channels opened so far. The registry should open one per node.
    pub fn opened_channels(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Bodies the ledger accepted, in order.
    pub fn accepted(&self) -> Vec<TransactionBody> {
        self.state.ledger.lock().accepted.clone()
    }

    /// Blobs that currently exist.
    pub fn blobs(&self) -> BTreeMap<BlobId, Bytes> {
        self.state
            .ledger
            .lock()
            .blobs
            .iter()
            .map(|(id, contents)| (*id, Bytes::copy_from_slice(contents)))
            .collect()
    }

    fn answer(&self, address: &str, request: WireRequest) -> MockReply {
        self.state.calls.lock().push(MockCall {
            address: address.to_string(),
            request: request.clone(),
        });

        if self.state.unreachable.lock().contains(address) {
            return MockReply::Fail(TransportError::Unavailable(format!("{address} is down")));
        }
        if let Some(reply) = self
            .state
            .by_address
            .lock()
            .get_mut(address)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        if let Some(reply) = self.state.any.lock().pop_front() {
            return reply;
        }

        let rule = self.state.rule.lock().clone();
        let mut ledger = self.state.ledger.lock();
        MockReply::Respond(match request {
            WireRequest::SubmitTransaction(signed) => ledger.submit(signed, rule.as_deref()),
            WireRequest::GetReceipt { transaction_id } => ledger.receipt(&transaction_id, false),
            WireRequest::GetRecord { transaction_id } => ledger.receipt(&transaction_id, true),
        })
    }
}

impl fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockNetwork")
            .field("calls", &self.call_count())
            .field("opened_channels", &self.opened_channels())
            .finish()
    }
}

impl ChannelFactory for MockNetwork {
    fn open(&self, address: &str) -> Result<Arc<dyn Channel>, TransportError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockChannel {
            address: address.to_string(),
            network: self.clone(),
        }))
    }
}

struct MockChannel {
    address: String,
    network: MockNetwork,
}

#[async_trait]
impl Channel for MockChannel {
    async fn call(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        match self.network.answer(&self.address, request) {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(err) => Err(err),
            MockReply::Hang => std::future::pending().await,
        }
    }
}
