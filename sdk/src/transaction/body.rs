//! Transaction bodies and their canonical signing bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::identity::{AccountId, BlobId, TransactionId};

/// An opaque request on behalf of a domain entity.
///
/// The engine never looks inside: `kind` names the operation for the node,
/// `inline` carries the payload when it fits in one transaction, and `blob`
/// points at previously uploaded contents when it didn't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRequest {
    pub kind: String,

    #[serde(default, with = "crate::encoding::hex_bytes")]
    pub inline: Bytes,

    #[serde(default)]
    pub blob: Option<BlobId>,
}

impl DomainRequest {
    /// A request carrying its payload inline.
    pub fn inline(kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            inline: payload.into(),
            blob: None,
        }
    }

    /// A request whose payload lives in a blob.
    pub fn referencing(kind: impl Into<String>, blob: BlobId) -> Self {
        Self {
            kind: kind.into(),
            inline: Bytes::new(),
            blob: Some(blob),
        }
    }
}

/// What a transaction asks the network to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionData {
    /// Create a temporary blob holding `contents`.
    BlobCreate {
        #[serde(with = "crate::encoding::hex_bytes")]
        contents: Bytes,
    },
    /// Append `contents` to an existing blob.
    BlobAppend {
        blob_id: BlobId,
        #[serde(with = "crate::encoding::hex_bytes")]
        contents: Bytes,
    },
    /// Delete a blob.
    BlobDelete { blob_id: BlobId },
    /// A domain operation.
    Domain(DomainRequest),
}

impl TransactionData {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &str {
        match self {
            Self::BlobCreate { .. } => "blob_create",
            Self::BlobAppend { .. } => "blob_append",
            Self::BlobDelete { .. } => "blob_delete",
            Self::Domain(request) => &request.kind,
        }
    }

    fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self {
            Self::BlobCreate { contents } => {
                buf.push(0x01);
                write_bytes(buf, contents);
            }
            Self::BlobAppend { blob_id, contents } => {
                buf.push(0x02);
                write_str(buf, &blob_id.to_string());
                write_bytes(buf, contents);
            }
            Self::BlobDelete { blob_id } => {
                buf.push(0x03);
                write_str(buf, &blob_id.to_string());
            }
            Self::Domain(request) => {
                buf.push(0x04);
                write_str(buf, &request.kind);
                write_bytes(buf, &request.inline);
                match request.blob {
                    Some(blob) => {
                        buf.push(0x01);
                        write_str(buf, &blob.to_string());
                    }
                    None => buf.push(0x00),
                }
            }
        }
    }
}

/// The signed portion of a transaction.
///
/// A body is specific to the node it is sent to (`node_account_id`), so a
/// request that rotates to another node gets a new body and new signatures.
/// Everything else, `transaction_id` included, stays fixed for the life of
/// the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub node_account_id: AccountId,
    pub max_fee: u64,
    pub valid_duration_secs: u64,
    #[serde(default)]
    pub memo: String,
    pub data: TransactionData,
}

impl TransactionBody {
    /// Canonical byte encoding that signatures cover.
    ///
    /// Variable-length fields are length-prefixed (u32 LE) and integers are
    /// little-endian, so no two distinct bodies share an encoding.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.payload_len());

        write_str(&mut buf, &self.transaction_id.to_string());
        write_str(&mut buf, &self.node_account_id.to_string());
        buf.extend_from_slice(&self.max_fee.to_le_bytes());
        buf.extend_from_slice(&self.valid_duration_secs.to_le_bytes());
        write_str(&mut buf, &self.memo);
        self.data.write_canonical(&mut buf);

        buf
    }

    fn payload_len(&self) -> usize {
        match &self.data {
            TransactionData::BlobCreate { contents } | TransactionData::BlobAppend { contents, .. } => {
                contents.len()
            }
            TransactionData::Domain(request) => request.inline.len(),
            TransactionData::BlobDelete { .. } => 0,
        }
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}
