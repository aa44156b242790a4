//! The transport seam: what the engine sends, what comes back, and how it
//! can fail.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{EntityId, Timestamp, TransactionId};
use crate::status::Status;
use crate::transaction::SignedTransaction;

/// A request to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum WireRequest {
    SubmitTransaction(SignedTransaction),
    GetReceipt { transaction_id: TransactionId },
    GetRecord { transaction_id: TransactionId },
}

impl WireRequest {
    /// The transaction this request is about.
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Self::SubmitTransaction(signed) => signed.body.transaction_id,
            Self::GetReceipt { transaction_id } | Self::GetRecord { transaction_id } => {
                *transaction_id
            }
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SubmitTransaction(_) => "submit",
            Self::GetReceipt { .. } => "get_receipt",
            Self::GetRecord { .. } => "get_record",
        }
    }
}

/// A node's reply.
///
/// Only `precheck`, `consensus_status` and `payload` drive the engine; the
/// rest is carried through to receipts and records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub precheck: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_status: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<Timestamp>,

    #[serde(default, with = "crate::encoding::hex_bytes")]
    pub payload: Bytes,
}

impl WireResponse {
    /// A bare precheck reply.
    pub fn precheck(status: Status) -> Self {
        Self {
            precheck: status,
            consensus_status: None,
            entity_id: None,
            consensus_timestamp: None,
            payload: Bytes::new(),
        }
    }

    /// A receipt reply: precheck OK with the given consensus status.
    pub fn receipt(status: Status) -> Self {
        Self {
            consensus_status: Some(status),
            ..Self::precheck(Status::Ok)
        }
    }

    pub fn with_entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_consensus_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.consensus_timestamp = Some(timestamp);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// Transport-level failures. Nothing here says anything about the request
/// itself; it never got a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The node is up but refusing traffic.
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// Could not connect, or the connection dropped mid-call.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The per-attempt deadline passed without a reply.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The node is shedding load.
    #[error("node resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The node rejected the call outright (bad method, bad params).
    #[error("call rejected: {0}")]
    Rejected(String),

    /// The reply could not be decoded.
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether another node might do better.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_)
                | Self::ConnectionFailed(_)
                | Self::DeadlineExceeded
                | Self::ResourceExhausted(_)
        )
    }
}

/// A connection to one node.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn call(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

/// Opens channels to node addresses. Called at most once per address for
/// the lifetime of a registry.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, address: &str) -> Result<Arc<dyn Channel>, TransportError>;
}
