//! Chunked submission and receipt polling end to end on the mock network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meridian_sdk::config::{ChunkConfig, PollConfig, DEFAULT_CHUNK_SIZE};
use meridian_sdk::crypto::Ed25519Signer;
use meridian_sdk::error::{Error, ErrorKind};
use meridian_sdk::identity::{EntityId, Timestamp};
use meridian_sdk::mock::{MockNetwork, MockReply};
use meridian_sdk::network::WireResponse;
use meridian_sdk::transaction::TransactionData;
use meridian_sdk::{
    ChunkProgress, ChunkedSubmission, Client, ExecuteOptions, Status, Transaction, TransactionId,
    TransactionReceiptQuery,
};

fn client_with(mock: &MockNetwork, chunking: ChunkConfig, polling: PollConfig) -> Client {
    Client::builder()
        .network([
            ("node-0:50211".to_string(), EntityId::from_num(3)),
            ("node-1:50211".to_string(), EntityId::from_num(4)),
        ])
        .channel_factory(Arc::new(mock.clone()))
        .operator(EntityId::from_num(1001), Arc::new(Ed25519Signer::from_seed(&[21; 32])))
        .chunk_config(chunking)
        .poll_config(polling)
        .build()
        .unwrap()
}

fn client(mock: &MockNetwork) -> Client {
    client_with(mock, ChunkConfig::default(), PollConfig::default())
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn kinds(mock: &MockNetwork) -> Vec<&'static str> {
    mock.accepted()
        .iter()
        .map(|body| match &body.data {
            TransactionData::BlobCreate { .. } => "create",
            TransactionData::BlobAppend { .. } => "append",
            TransactionData::BlobDelete { .. } => "delete",
            TransactionData::Domain(request) if request.blob.is_some() => "reference",
            TransactionData::Domain(_) => "inline",
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chunking threshold
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_at_the_ceiling_goes_inline() {
    let mock = MockNetwork::new();
    let client = client(&mock);

    let outcome = ChunkedSubmission::new("contract_create", payload(DEFAULT_CHUNK_SIZE))
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(kinds(&mock), ["inline"]);
    assert_eq!(outcome.chunks, 1);
    assert!(outcome.blob_id.is_none());
    assert!(outcome.receipt.is_success());
    assert_eq!(&outcome.receipt.payload[..], &payload(DEFAULT_CHUNK_SIZE)[..]);
}

#[tokio::test]
async fn one_byte_over_the_ceiling_uses_a_blob() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    let data = payload(DEFAULT_CHUNK_SIZE + 1);

    let outcome = ChunkedSubmission::new("contract_create", data.clone())
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(kinds(&mock), ["create", "append", "reference", "delete"]);
    assert_eq!(outcome.chunks, 2);

    let accepted = mock.accepted();
    let TransactionData::BlobCreate { contents } = &accepted[0].data else {
        panic!("first transaction should create the blob");
    };
    assert_eq!(contents.len(), DEFAULT_CHUNK_SIZE);
    let TransactionData::Domain(request) = &accepted[2].data else {
        panic!("third transaction should reference the blob");
    };
    assert!(request.inline.is_empty());
    assert_eq!(request.blob, outcome.blob_id);

    let record = outcome.response.get_record(&client).await.unwrap();
    assert_eq!(&record.payload[..], &data[..]);
}

#[tokio::test]
async fn appends_arrive_in_payload_order() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig {
            chunk_size: 7,
            max_chunks: 20,
            delete_blob_after: false,
        },
        PollConfig::default(),
    );
    let data = payload(100);

    let outcome = ChunkedSubmission::new("k", data.clone()).execute(&client).await.unwrap();

    assert_eq!(outcome.chunks, 15);
    let mut reassembled = Vec::new();
    for body in mock.accepted() {
        match body.data {
            TransactionData::BlobCreate { contents } | TransactionData::BlobAppend { contents, .. } => {
                reassembled.extend_from_slice(&contents)
            }
            _ => {}
        }
    }
    assert_eq!(reassembled, data);
    assert_eq!(&mock.blobs()[&outcome.blob_id.unwrap()][..], &data[..]);
}

#[tokio::test]
async fn oversized_payload_is_refused_before_sending() {
    let mock = MockNetwork::new();
    let client = client(&mock);

    let err = ChunkedSubmission::new("k", payload(DEFAULT_CHUNK_SIZE * 20 + 1))
        .execute(&client)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TooManyChunks { required: 21, max: 20 }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(mock.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Partial failure and resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_append_reports_progress_and_resumes() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig {
            chunk_size: 4,
            max_chunks: 10,
            delete_blob_after: false,
        },
        PollConfig::default(),
    );
    let data = payload(16);

    let appends = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&appends);
    mock.set_consensus_rule(move |body| match body.data {
        TransactionData::BlobAppend { .. } if seen.fetch_add(1, Ordering::SeqCst) == 1 => Some(Status::FailInvalid),
        _ => None,
    });

    let submission = ChunkedSubmission::new("k", data.clone());
    let err = submission.execute(&client).await.unwrap_err();

    let (progress, source) = match err {
        Error::Chunked { progress, source } => (progress, source),
        other => panic!("expected a chunked failure, got {other}"),
    };
    assert!(progress.blob_id.is_some());
    assert_eq!(progress.offset, 8);
    assert!(matches!(
        *source,
        Error::ReceiptStatus {
            status: Status::FailInvalid,
            ..
        }
    ));

    mock.clear_consensus_rule();
    let outcome = submission
        .execute_from(&client, progress, Default::default())
        .await
        .unwrap();

    assert_eq!(outcome.blob_id, progress.blob_id);
    assert_eq!(&mock.blobs()[&outcome.blob_id.unwrap()][..], &data[..]);
    let record = outcome.response.get_record(&client).await.unwrap();
    assert_eq!(&record.payload[..], &data[..]);
}

#[tokio::test]
async fn failed_create_reports_no_blob() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig {
            chunk_size: 4,
            ..Default::default()
        },
        PollConfig::default(),
    );
    mock.set_consensus_rule(|body| match body.data {
        TransactionData::BlobCreate { .. } => Some(Status::InsufficientPayerBalance),
        _ => None,
    });

    let err = ChunkedSubmission::new("k", payload(9)).execute(&client).await.unwrap_err();

    match err {
        Error::Chunked { progress, .. } => assert_eq!(progress, ChunkProgress::default()),
        other => panic!("expected a chunked failure, got {other}"),
    }
}

#[tokio::test]
async fn maximal_timeout_uploads_without_a_deadline() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig {
            chunk_size: 4,
            ..Default::default()
        },
        PollConfig::default(),
    );
    let data = payload(10);

    let outcome = ChunkedSubmission::new("k", data.clone())
        .execute_from(
            &client,
            ChunkProgress::default(),
            ExecuteOptions::default().with_timeout(Duration::MAX),
        )
        .await
        .unwrap();

    assert_eq!(outcome.chunks, 3);
    assert_eq!(&outcome.receipt.payload[..], &data[..]);
}

#[test]
fn blocking_chunked_submission() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig {
            chunk_size: 3,
            ..Default::default()
        },
        PollConfig::default(),
    );

    let outcome = ChunkedSubmission::new("k", payload(10)).execute_blocking(&client).unwrap();

    assert_eq!(outcome.chunks, 4);
    assert_eq!(kinds(&mock), ["create", "append", "append", "append", "reference", "delete"]);
}

// ---------------------------------------------------------------------------
// Receipt polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn pending_receipts_are_polled_until_final() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    let response = Transaction::domain("k", vec![1]).execute(&client).await.unwrap();

    mock.push(WireResponse::receipt(Status::Unknown));
    mock.push(WireResponse::precheck(Status::Busy));
    mock.push(WireResponse::receipt(Status::Ok));

    let receipt = response.get_receipt(&client).await.unwrap();

    assert!(receipt.is_success());
    assert_eq!(receipt.transaction_id, response.transaction_id);
    // One submission plus four polls.
    assert_eq!(mock.call_count(), 5);
}

#[tokio::test]
async fn successful_receipt_carries_the_result_payload() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    mock.push(WireResponse::receipt(Status::Success).with_payload(vec![9, 9, 9]));

    let id = TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 0));
    let receipt = TransactionReceiptQuery::new(id).execute(&client).await.unwrap();

    assert!(receipt.is_success());
    assert_eq!(&receipt.payload[..], &[9, 9, 9]);
}

#[tokio::test(start_paused = true)]
async fn record_query_shares_one_deadline_with_its_receipt_wait() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    let response = Transaction::domain("k", vec![1]).execute(&client).await.unwrap();

    // Three pending polls take 2.25s of the 3s allowed; the record poll
    // then hangs and must give up with the remaining 0.75s.
    for _ in 0..3 {
        mock.push(WireResponse::receipt(Status::Unknown));
    }
    mock.push(MockReply::Hang);

    let started = tokio::time::Instant::now();
    let err = response
        .record_query()
        .execute_with(&client, ExecuteOptions::default().with_timeout(Duration::from_secs(3)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn failed_consensus_is_a_receipt_status_error() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    mock.set_consensus_rule(|_| Some(Status::FailFee));

    let response = Transaction::domain("k", vec![1]).execute(&client).await.unwrap();
    let err = response.get_receipt(&client).await.unwrap_err();
    assert!(matches!(err, Error::ReceiptStatus { status: Status::FailFee, .. }));
    assert_eq!(err.kind(), ErrorKind::ReceiptStatus);

    let unvalidated = TransactionReceiptQuery::new(response.transaction_id)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(unvalidated.status, Status::FailFee);

    let err = response.get_record(&client).await.unwrap_err();
    assert!(matches!(err, Error::ReceiptStatus { status: Status::FailFee, .. }));
}

#[tokio::test]
async fn terminal_receipt_precheck_fails_immediately() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    mock.push(WireResponse::precheck(Status::InvalidTransactionId));

    let id = TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 0));
    let err = TransactionReceiptQuery::new(id).execute(&client).await.unwrap_err();

    assert!(matches!(
        err,
        Error::PrecheckStatus {
            status: Status::InvalidTransactionId,
            ..
        }
    ));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn receipt_polling_times_out_distinctly() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig::default(),
        PollConfig {
            timeout_ms: 3_000,
            ..Default::default()
        },
    );
    let id = TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 0));

    let err = TransactionReceiptQuery::new(id).execute(&client).await.unwrap_err();

    let Error::Timeout { last, .. } = &err else {
        panic!("expected a timeout, got {err}");
    };
    assert!(matches!(
        last.as_deref(),
        Some(Error::PrecheckStatus {
            status: Status::ReceiptNotFound,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn receipt_polling_is_bounded_by_attempts() {
    let mock = MockNetwork::new();
    let client = client_with(
        &mock,
        ChunkConfig::default(),
        PollConfig {
            max_attempts: 3,
            ..Default::default()
        },
    );
    let id = TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 0));

    let err = TransactionReceiptQuery::new(id).execute(&client).await.unwrap_err();

    assert!(matches!(err, Error::MaxAttemptsExceeded { attempts: 3, .. }));
    assert_eq!(mock.call_count(), 3);
}

#[test]
fn blocking_receipt_matches_async() {
    let mock = MockNetwork::new();
    let client = client(&mock);
    let response = Transaction::domain("k", vec![4, 5])
        .freeze(&client)
        .unwrap()
        .execute_blocking(&client)
        .unwrap();

    let receipt = response.get_receipt_blocking(&client).unwrap();
    let record = response.get_record_blocking(&client).unwrap();

    assert!(receipt.is_success());
    assert_eq!(record.receipt, receipt);
    assert_eq!(&record.payload[..], &[4, 5]);
}
