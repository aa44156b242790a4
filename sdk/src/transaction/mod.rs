//! # Transactions
//!
//! From "what the caller wants" to "what a node receives".
//!
//! 1. **body**: [`TransactionData`] and the node-specific
//!    [`TransactionBody`] with its canonical signing bytes.
//! 2. **signed**: [`SignedTransaction`], a body plus signatures, and its
//!    SHA-384 [`TransactionHash`].
//! 3. **builder**: the [`Transaction`] builder and the executable
//!    [`FrozenTransaction`].
//! 4. **response**: [`TransactionResponse`], the handle used to fetch the
//!    receipt or record.
//!
//! ## Design Decisions
//!
//! - The transaction id is fixed at freeze time and never changes across
//!   retries or node rotation, so a node that already saw the transaction
//!   reports it as a duplicate instead of applying it twice.
//! - Bodies name the node they are sent to. Rotating to another node means
//!   a new body and new signatures, produced by the same re-enterable
//!   build-and-sign step as the first attempt.

pub mod body;
pub mod builder;
pub mod response;
pub mod signed;

pub use body::{DomainRequest, TransactionBody, TransactionData};
pub use builder::{FrozenTransaction, Transaction};
pub use response::TransactionResponse;
pub use signed::{SignaturePair, SignedTransaction, TransactionHash};
