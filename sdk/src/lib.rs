// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian SDK: Client Library
//!
//! Talks to a replicated ledger network whose nodes may be busy, slow or
//! down. The SDK hides that: it picks a node, sends, reads the verdict, and
//! retries, backs off or moves to another node as the verdict demands, then
//! polls until consensus has decided the outcome.
//!
//! ## Architecture
//!
//! - **identity**: Entity ids, timestamps, transaction ids and the
//!   per-payer monotonic id generator.
//! - **status**: Node status codes and the tables that classify them.
//! - **crypto**: The `Signer` seam and its Ed25519 implementation.
//! - **network**: Channels, the node registry and node health.
//! - **transaction**: Bodies, signing and the submit path.
//! - **execute**: The retry/rotate/backoff engine every request runs on.
//! - **receipt**: Receipt and record polling.
//! - **chunked**: Large payloads via a temporary blob.
//! - **client**: Ties the above together behind one cloneable handle.
//! - **config**: Every tunable, with defaults.
//! - **mock**: An in-process network for tests.
//!
//! ## Quick Tour
//!
//! ```no_run
//! # async fn run(client: meridian_sdk::Client) -> meridian_sdk::Result<()> {
//! use meridian_sdk::Transaction;
//!
//! let response = Transaction::domain("contract_call", vec![1, 2, 3])
//!     .memo("hello")
//!     .execute(&client)
//!     .await?;
//! let receipt = response.get_receipt(&client).await?;
//! println!("{} -> {}", receipt.transaction_id, receipt.status);
//! # Ok(())
//! # }
//! ```

pub mod chunked;
pub mod client;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod execute;
pub mod identity;
pub mod mock;
pub mod network;
pub mod receipt;
pub mod status;
pub mod transaction;

pub use chunked::{ChunkProgress, ChunkedOutcome, ChunkedSubmission};
pub use client::{Client, ClientBuilder, Operator};
pub use config::{ChunkConfig, ClientConfig, ExecutionConfig, PollConfig};
pub use crypto::{Ed25519Signer, PublicKey, Signer};
pub use error::{Error, ErrorKind, Result};
pub use execute::{execute, execute_blocking, spawn_execute, ExecuteOptions, Executable, ExecutionHandle};
pub use identity::{AccountId, BlobId, EntityId, IdGenerator, Timestamp, TransactionId};
pub use receipt::{TransactionReceipt, TransactionReceiptQuery, TransactionRecord, TransactionRecordQuery};
pub use status::{Disposition, Status};
pub use transaction::{FrozenTransaction, Transaction, TransactionResponse};
