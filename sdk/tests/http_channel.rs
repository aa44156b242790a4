//! The JSON-RPC channel against a fake node served by axum.
//!
//! The fake node decodes each call and answers from a [`MockNetwork`]
//! ledger, so these tests cover the wire format and HTTP error mapping
//! while the ledger logic stays the one the other suites use.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use meridian_sdk::crypto::Ed25519Signer;
use meridian_sdk::error::{Error, ErrorKind};
use meridian_sdk::identity::{AccountId, EntityId};
use meridian_sdk::mock::MockNetwork;
use meridian_sdk::network::{Channel, ChannelFactory, RpcError, RpcRequest, RpcResponse, TransportError};
use meridian_sdk::{Client, Status, Transaction};

// ---------------------------------------------------------------------------
// Fake node
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Mode {
    Ledger,
    Unavailable,
    RpcError,
}

#[derive(Clone)]
struct FakeNode {
    mode: Mode,
    ledger: Arc<dyn Channel>,
    hits: Arc<AtomicUsize>,
}

async fn rpc_handler(State(node): State<FakeNode>, Json(request): Json<RpcRequest>) -> Response {
    node.hits.fetch_add(1, Ordering::SeqCst);
    let id = request.id;
    match node.mode {
        Mode::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Mode::RpcError => Json(RpcResponse::error(id, RpcError::internal_error("ledger offline"))).into_response(),
        Mode::Ledger => {
            let wire = match request.into_wire() {
                Ok(wire) => wire,
                Err(e) => return Json(RpcResponse::error(id, RpcError::invalid_params(e.to_string()))).into_response(),
            };
            match node.ledger.call(wire).await {
                Ok(reply) => Json(RpcResponse::success(id, serde_json::to_value(reply).unwrap())).into_response(),
                Err(e) => Json(RpcResponse::error(id, RpcError::internal_error(e.to_string()))).into_response(),
            }
        }
    }
}

/// Serves a fake node on an ephemeral port.
async fn spawn_node(mode: Mode, ledger: &MockNetwork) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = FakeNode {
        mode,
        ledger: ledger.open("fake").unwrap(),
        hits: Arc::clone(&hits),
    };
    let app = Router::new().route("/", post(rpc_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn http_client(nodes: Vec<(String, AccountId)>) -> Client {
    Client::builder()
        .network(nodes)
        .operator(EntityId::from_num(1001), Arc::new(Ed25519Signer::from_seed(&[31; 32])))
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_and_fetch_receipt_over_http() {
    let ledger = MockNetwork::new();
    let (addr, hits) = spawn_node(Mode::Ledger, &ledger).await;
    let client = http_client(vec![(addr.to_string(), EntityId::from_num(3))]);

    let response = Transaction::domain("contract_call", vec![7, 7, 7])
        .execute(&client)
        .await
        .unwrap();
    let receipt = response.get_receipt(&client).await.unwrap();
    let record = response.get_record(&client).await.unwrap();

    assert_eq!(response.node_id, EntityId::from_num(3));
    assert!(receipt.is_success());
    assert_eq!(&record.payload[..], &[7, 7, 7]);
    assert!(record.consensus_timestamp.is_some());
    assert!(hits.load(Ordering::SeqCst) >= 4);

    let accepted = ledger.accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].transaction_id, response.transaction_id);
}

#[tokio::test]
async fn service_unavailable_rotates_to_a_healthy_node() {
    let ledger = MockNetwork::new();
    let (down, down_hits) = spawn_node(Mode::Unavailable, &ledger).await;
    let (up, _) = spawn_node(Mode::Ledger, &ledger).await;
    let client = http_client(vec![
        (down.to_string(), EntityId::from_num(3)),
        (up.to_string(), EntityId::from_num(4)),
    ]);

    let response = Transaction::domain("k", vec![1]).execute(&client).await.unwrap();

    assert_eq!(response.node_id, EntityId::from_num(4));
    assert!(down_hits.load(Ordering::SeqCst) <= 1);
}

#[tokio::test]
async fn rpc_errors_are_not_retried() {
    let ledger = MockNetwork::new();
    let (addr, hits) = spawn_node(Mode::RpcError, &ledger).await;
    let client = http_client(vec![(addr.to_string(), EntityId::from_num(3))]);

    let err = Transaction::domain("k", vec![1]).execute(&client).await.unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Rejected(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_connection_exhausts_single_node_network() {
    // Bind then drop to find a port nothing listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = http_client(vec![(addr.to_string(), EntityId::from_num(3))]);

    let err = Transaction::domain("k", vec![1]).execute(&client).await.unwrap_err();

    assert!(matches!(
        err,
        Error::NodesExhausted {
            tried: 1,
            last: TransportError::ConnectionFailed(_)
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn receipt_precheck_codes_travel_as_results() {
    let ledger = MockNetwork::new();
    ledger.push(meridian_sdk::network::WireResponse::precheck(Status::InvalidTransactionId));
    let (addr, _) = spawn_node(Mode::Ledger, &ledger).await;
    let client = http_client(vec![(addr.to_string(), EntityId::from_num(3))]);

    let id = client.generate_transaction_id().unwrap();
    let err = meridian_sdk::TransactionReceiptQuery::new(id)
        .execute(&client)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PrecheckStatus {
            status: Status::InvalidTransactionId,
            ..
        }
    ));
}
