//! Signed transactions as they travel to a node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};

use super::body::TransactionBody;
use crate::crypto::{PublicKey, SignError, Signer};

/// One signature over a body's signable bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub signature: Vec<u8>,
}

/// A body plus every signature it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body: TransactionBody,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    /// Signs `body` with each signer in order.
    pub fn sign(body: TransactionBody, signers: &[Arc<dyn Signer>]) -> Result<Self, SignError> {
        let message = body.signable_bytes();
        let signatures = signers
            .iter()
            .map(|signer| {
                Ok(SignaturePair {
                    public_key: signer.public_key(),
                    signature: signer.sign(&message)?,
                })
            })
            .collect::<Result<Vec<_>, SignError>>()?;

        Ok(Self { body, signatures })
    }

    /// True when there is at least one signature and every signature verifies.
    pub fn verify_signatures(&self) -> bool {
        if self.signatures.is_empty() {
            return false;
        }
        let message = self.body.signable_bytes();
        self.signatures
            .iter()
            .all(|pair| pair.public_key.verify(&message, &pair.signature))
    }

    /// SHA-384 over the signable bytes followed by each signature. Identifies
    /// exactly what a node received.
    pub fn transaction_hash(&self) -> TransactionHash {
        let mut hasher = Sha384::new();
        hasher.update(self.body.signable_bytes());
        for pair in &self.signatures {
            hasher.update(pair.public_key.as_bytes());
            hasher.update(&pair.signature);
        }
        TransactionHash(hasher.finalize().to_vec())
    }
}

/// Hash of a signed transaction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(#[serde(with = "crate::encoding::hex_bytes")] Vec<u8>);

impl TransactionHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionHash({self})")
    }
}
