//! # Signing
//!
//! The engine needs exactly two things from cryptography: a public key to
//! attach to a signature, and a way to sign the bytes of a transaction body.
//! Both come through the [`Signer`] trait, so the core never touches key
//! material and never cares whether a key lives in memory, in an HSM or
//! behind a remote signing service.
//!
//! [`Ed25519Signer`] is the in-memory default.

pub mod keys;

use thiserror::Error;

pub use keys::{Ed25519Signer, KeyError, PublicKey};

/// Errors from a signing collaborator.
#[derive(Debug, Error)]
pub enum SignError {
    /// The key could not be loaded or decoded.
    #[error("signing key unavailable: {0}")]
    Key(#[from] KeyError),

    /// The signer was reachable but refused or failed to sign.
    #[error("signer failed: {0}")]
    Failed(String),
}

/// Something that can sign transaction bodies.
///
/// Implementations must be deterministic enough that re-signing the same body
/// for a retry is harmless, and must be shareable across concurrently
/// executing requests.
pub trait Signer: Send + Sync {
    /// The key signatures from this signer verify against.
    fn public_key(&self) -> PublicKey;

    /// Signs `message`, returning the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError>;
}
