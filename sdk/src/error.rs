//! # Error Taxonomy
//!
//! Every execution path returns [`Error`]. Callers that only care about the
//! broad category (should I retry later? fix my config? report a bug?) match
//! on [`Error::kind`] instead of on individual variants.

use std::time::Duration;

use thiserror::Error;

use crate::chunked::ChunkProgress;
use crate::config::ConfigError;
use crate::crypto::SignError;
use crate::identity::{IdError, TransactionId};
use crate::network::TransportError;
use crate::status::Status;

/// Result alias used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client was set up wrong. Retrying won't help.
    Configuration,
    /// No node could be reached, or a node failed at the transport level.
    Transport,
    /// A node refused the request before processing it.
    Precheck,
    /// The network processed the request and decided against it.
    ReceiptStatus,
    /// Attempts or wall-clock time ran out.
    Timeout,
    /// The caller cancelled.
    Cancelled,
    /// A bug or an environment problem inside the client.
    Internal,
}

/// Errors from the client library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network map is empty")]
    EmptyNetwork,

    #[error("no node is registered for {0}")]
    UnknownNode(String),

    #[error("no operator configured; set one to {0}")]
    NoOperator(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("tried {tried} nodes, all failed; last error: {last}")]
    NodesExhausted {
        /// Distinct nodes attempted.
        tried: usize,
        /// Failure from the final node.
        last: TransportError,
    },

    #[error("transaction {transaction_id} failed precheck with status {status}")]
    PrecheckStatus {
        transaction_id: TransactionId,
        status: Status,
    },

    #[error("receipt for transaction {transaction_id} contained error status {status}")]
    ReceiptStatus {
        transaction_id: TransactionId,
        status: Status,
    },

    #[error("gave up after {attempts} attempts; last error: {last}")]
    MaxAttemptsExceeded {
        attempts: u32,
        last: Box<Error>,
    },

    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before giving up.
        elapsed: Duration,
        /// The most recent failure, if any attempt completed.
        last: Option<Box<Error>>,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("signing failed: {0}")]
    Sign(#[from] SignError),

    #[error("memo is {len} bytes; nodes accept at most {max}")]
    MemoTooLong { len: usize, max: usize },

    #[error("payload needs {required} chunks but at most {max} are allowed")]
    TooManyChunks { required: usize, max: usize },

    #[error("chunked submission stopped at offset {} of blob {:?}: {source}", .progress.offset, .progress.blob_id)]
    Chunked {
        /// How far the upload got; pass to `execute_from` to resume.
        progress: ChunkProgress,
        #[source]
        source: Box<Error>,
    },

    #[error("node returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Broad category of this error. A chunked failure reports the category
    /// of the step that failed.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyNetwork
            | Self::UnknownNode(_)
            | Self::NoOperator(_)
            | Self::Config(_)
            | Self::Id(_)
            | Self::MemoTooLong { .. }
            | Self::TooManyChunks { .. } => ErrorKind::Configuration,
            Self::Transport(_) | Self::NodesExhausted { .. } => ErrorKind::Transport,
            Self::PrecheckStatus { .. } => ErrorKind::Precheck,
            Self::ReceiptStatus { .. } => ErrorKind::ReceiptStatus,
            Self::MaxAttemptsExceeded { .. } | Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Chunked { source, .. } => source.kind(),
            Self::Sign(_) | Self::MalformedResponse(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The node-reported status behind this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::PrecheckStatus { status, .. } | Self::ReceiptStatus { status, .. } => Some(*status),
            Self::MaxAttemptsExceeded { last, .. } => last.status(),
            Self::Chunked { source, .. } => source.status(),
            _ => None,
        }
    }
}
