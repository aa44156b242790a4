//! Walkthrough of the Meridian client lifecycle on an in-process network.
//!
//! Generates transaction ids, submits a transaction through a flaky node set,
//! waits for its receipt, and pushes a payload large enough to need chunking.
//!
//! Run with:
//!   cargo run -p meridian-sdk --example demo

use std::sync::Arc;
use std::time::Instant;

use meridian_sdk::config::ChunkConfig;
use meridian_sdk::crypto::{Ed25519Signer, Signer};
use meridian_sdk::identity::EntityId;
use meridian_sdk::mock::MockNetwork;
use meridian_sdk::network::WireResponse;
use meridian_sdk::{ChunkedSubmission, Client, Status, Transaction};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]==================================================={RESET}");
    println!("{BOLD}  {title}{RESET}");
}

fn kv(key: &str, value: impl std::fmt::Display) {
    println!("{DIM}  {key:<18}{RESET}{value}");
}

fn ok(text: &str) {
    println!("{GREEN}  [ok]{RESET} {text}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockNetwork::new();
    let signer = Arc::new(Ed25519Signer::generate());
    let client = Client::builder()
        .network((0..4).map(|i| (format!("node-{i}:50211"), EntityId::from_num(3 + i))))
        .channel_factory(Arc::new(mock.clone()))
        .operator(EntityId::from_num(1001), signer.clone())
        .chunk_config(ChunkConfig {
            chunk_size: 1024,
            ..Default::default()
        })
        .build()?;

    section(1, "Transaction ids");
    kv("operator key", signer.public_key().to_hex());
    for _ in 0..3 {
        kv("generated", client.generate_transaction_id()?);
    }

    section(2, "Submission through a flaky network");
    mock.set_unreachable("node-0:50211");
    mock.push(WireResponse::precheck(Status::Busy));
    let started = Instant::now();
    let response = Transaction::domain("contract_call", b"hello".to_vec())
        .memo("demo")
        .execute(&client)
        .await?;
    kv("accepted by", response.node_id);
    kv("hash", &response.transaction_hash);
    kv("dispatches", mock.call_count());
    kv("elapsed", format!("{:?}", started.elapsed()));

    section(3, "Receipt");
    let receipt = response.get_receipt(&client).await?;
    kv("status", receipt.status);
    ok("transaction reached consensus");

    section(4, "Chunked submission");
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    let outcome = ChunkedSubmission::new("contract_create", payload).execute(&client).await?;
    kv("chunks", outcome.chunks);
    kv("blob", format!("{:?}", outcome.blob_id));
    kv("final status", outcome.receipt.status);
    ok("payload delivered and temporary blob removed");

    println!();
    println!("{BOLD}Metrics{RESET}");
    print!("{}", client.metrics().encode()?);
    Ok(())
}
