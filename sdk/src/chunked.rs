//! # Chunked Submission
//!
//! Nodes cap the size of one transaction, so large domain payloads travel in
//! pieces through a temporary blob:
//!
//! ```text
//!   payload ≤ chunk_size:  Domain(inline) ─▶ receipt
//!
//!   otherwise:             BlobCreate(slice 0) ─▶ receipt ─▶ blob id
//!                          BlobAppend(slice 1) ─▶ receipt
//!                          ...                               (strictly in order)
//!                          Domain(blob = id)  ─▶ receipt
//!                          BlobDelete(id)                    (best effort)
//! ```
//!
//! Every step waits for its receipt before the next is sent, because an
//! append that lands before its predecessor corrupts the blob.
//!
//! A failed step stops the upload and reports a [`ChunkProgress`]: the blob
//! (if one was created) and the offset up to which the payload is known to
//! be stored. [`ChunkedSubmission::execute_from`] picks up from there.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::ChunkConfig;
use crate::crypto::Signer;
use crate::error::{Error, Result};
use crate::execute::{self, Budget, ExecuteOptions};
use crate::identity::BlobId;
use crate::receipt::TransactionReceipt;
use crate::transaction::{DomainRequest, Transaction, TransactionData, TransactionResponse};

/// How far a chunked upload got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProgress {
    /// The temporary blob, once created.
    pub blob_id: Option<BlobId>,
    /// Bytes of the payload stored in the blob.
    pub offset: usize,
}

/// Result of a completed chunked submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedOutcome {
    /// Response to the final domain transaction.
    pub response: TransactionResponse,
    /// Its successful receipt.
    pub receipt: TransactionReceipt,
    /// The temporary blob, for payloads that needed one.
    pub blob_id: Option<BlobId>,
    /// Transactions it took to carry the payload (1 when inline).
    pub chunks: usize,
}

/// A domain operation whose payload may need splitting.
#[derive(Clone)]
pub struct ChunkedSubmission {
    kind: String,
    payload: Bytes,
    memo: String,
    max_fee: Option<u64>,
    config: Option<ChunkConfig>,
    signers: Vec<Arc<dyn Signer>>,
}

impl ChunkedSubmission {
    pub fn new(kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
            memo: String::new(),
            max_fee: None,
            config: None,
            signers: Vec::new(),
        }
    }

    /// Memo applied to every transaction in the upload.
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn max_fee(mut self, max_fee: u64) -> Self {
        self.max_fee = Some(max_fee);
        self
    }

    /// Overrides the client's chunking policy for this submission.
    pub fn chunk_config(mut self, config: ChunkConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn sign_with(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub async fn execute(&self, client: &Client) -> Result<ChunkedOutcome> {
        self.execute_from(client, ChunkProgress::default(), ExecuteOptions::default())
            .await
    }

    pub fn execute_blocking(&self, client: &Client) -> Result<ChunkedOutcome> {
        execute::block_on(self.execute(client))
    }

    pub fn execute_from_blocking(&self, client: &Client, progress: ChunkProgress) -> Result<ChunkedOutcome> {
        execute::block_on(self.execute_from(client, progress, ExecuteOptions::default()))
    }

    /// Runs the upload, skipping whatever `progress` says is already stored.
    ///
    /// `options.timeout` bounds the whole upload; `options.cancel` stops it
    /// between or during steps.
    pub async fn execute_from(
        &self,
        client: &Client,
        progress: ChunkProgress,
        options: ExecuteOptions,
    ) -> Result<ChunkedOutcome> {
        let config = self.config.as_ref().unwrap_or_else(|| client.chunk_config());
        config.validate()?;

        let len = self.payload.len();
        let chunks = config.chunks_for(len);
        if chunks > config.max_chunks {
            return Err(Error::TooManyChunks {
                required: chunks,
                max: config.max_chunks,
            });
        }

        let budget = Budget::new(options);

        if len <= config.chunk_size {
            debug!(kind = %self.kind, len, "payload fits inline");
            let data = TransactionData::Domain(DomainRequest::inline(self.kind.clone(), self.payload.clone()));
            let (response, receipt) = self.step(client, data, &budget).await?;
            return Ok(ChunkedOutcome {
                response,
                receipt,
                blob_id: None,
                chunks: 1,
            });
        }

        info!(kind = %self.kind, len, chunks, resume_offset = progress.offset, "starting chunked submission");

        let mut progress = progress;
        let (response, receipt) = self
            .upload(client, config, &budget, &mut progress)
            .await
            .map_err(|source| Error::Chunked {
                progress,
                source: Box::new(source),
            })?;

        let blob_id = progress.blob_id;
        if config.delete_blob_after {
            if let Some(blob_id) = blob_id {
                self.delete_blob(client, blob_id, &budget).await;
            }
        }

        Ok(ChunkedOutcome {
            response,
            receipt,
            blob_id,
            chunks,
        })
    }

    async fn upload(
        &self,
        client: &Client,
        config: &ChunkConfig,
        budget: &Budget,
        progress: &mut ChunkProgress,
    ) -> Result<(TransactionResponse, TransactionReceipt)> {
        let len = self.payload.len();
        let chunk_size = config.chunk_size;

        let blob_id = match progress.blob_id {
            Some(blob_id) => blob_id,
            None => {
                let end = chunk_size.min(len);
                let data = TransactionData::BlobCreate {
                    contents: self.payload.slice(..end),
                };
                let (_, receipt) = self.step(client, data, budget).await?;
                let blob_id = receipt
                    .entity_id
                    .ok_or_else(|| Error::MalformedResponse("blob create receipt has no blob id".into()))?;
                *progress = ChunkProgress {
                    blob_id: Some(blob_id),
                    offset: end,
                };
                debug!(blob = %blob_id, offset = end, "blob created");
                blob_id
            }
        };

        while progress.offset < len {
            let start = progress.offset;
            let end = (start + chunk_size).min(len);
            let data = TransactionData::BlobAppend {
                blob_id,
                contents: self.payload.slice(start..end),
            };
            self.step(client, data, budget).await?;
            progress.offset = end;
            debug!(blob = %blob_id, offset = end, len, "chunk appended");
        }

        let data = TransactionData::Domain(DomainRequest::referencing(self.kind.clone(), blob_id));
        self.step(client, data, budget).await
    }

    async fn delete_blob(&self, client: &Client, blob_id: BlobId, budget: &Budget) {
        let data = TransactionData::BlobDelete { blob_id };
        match self.step(client, data, budget).await {
            Ok(_) => debug!(blob = %blob_id, "temporary blob deleted"),
            Err(err) => warn!(blob = %blob_id, error = %err, "failed to delete temporary blob"),
        }
    }

    /// Submits one transaction and waits for its successful receipt.
    async fn step(
        &self,
        client: &Client,
        data: TransactionData,
        budget: &Budget,
    ) -> Result<(TransactionResponse, TransactionReceipt)> {
        let mut transaction = Transaction::new(data).memo(self.memo.clone());
        if let Some(max_fee) = self.max_fee {
            transaction = transaction.max_fee(max_fee);
        }
        for signer in &self.signers {
            transaction = transaction.sign_with(Arc::clone(signer));
        }

        let frozen = transaction.freeze(client)?;
        let response = frozen
            .execute_with(client, budget.options(client.execution_config().request_timeout())?)
            .await?;
        let receipt = response
            .receipt_query()
            .execute_with(client, budget.options(client.poll_config().timeout())?)
            .await?;
        Ok((response, receipt))
    }
}

impl std::fmt::Debug for ChunkedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedSubmission")
            .field("kind", &self.kind)
            .field("len", &self.payload.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityId;
    use crate::mock::MockNetwork;
    use crate::crypto::Ed25519Signer;

    fn client(mock: &MockNetwork, config: ChunkConfig) -> Client {
        Client::builder()
            .network([("node-0:50211".to_string(), EntityId::from_num(3))])
            .channel_factory(Arc::new(mock.clone()))
            .operator(EntityId::from_num(1001), Arc::new(Ed25519Signer::from_seed(&[2; 32])))
            .chunk_config(config)
            .build()
            .unwrap()
    }

    fn small_chunks() -> ChunkConfig {
        ChunkConfig {
            chunk_size: 4,
            max_chunks: 3,
            delete_blob_after: true,
        }
    }

    #[tokio::test]
    async fn too_many_chunks_sends_nothing() {
        let mock = MockNetwork::new();
        let client = client(&mock, small_chunks());
        let err = ChunkedSubmission::new("k", vec![0u8; 13])
            .execute(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyChunks { required: 4, max: 3 }));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn blob_is_deleted_after_success() {
        let mock = MockNetwork::new();
        let client = client(&mock, small_chunks());
        let outcome = ChunkedSubmission::new("k", b"0123456789".to_vec())
            .execute(&client)
            .await
            .unwrap();
        assert_eq!(outcome.chunks, 3);
        assert!(outcome.blob_id.is_some());
        assert!(mock.blobs().is_empty());
    }

    #[tokio::test]
    async fn blob_is_kept_when_asked() {
        let mock = MockNetwork::new();
        let client = client(
            &mock,
            ChunkConfig {
                delete_blob_after: false,
                ..small_chunks()
            },
        );
        let outcome = ChunkedSubmission::new("k", b"0123456789".to_vec())
            .execute(&client)
            .await
            .unwrap();
        let blob = outcome.blob_id.unwrap();
        assert_eq!(&mock.blobs()[&blob][..], b"0123456789");
    }
}
