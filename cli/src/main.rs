// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # meridian
//!
//! Command-line client for Meridian networks, built on `meridian-sdk`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate three strictly increasing ids for a payer
//! meridian id generate --payer 0.0.1001 --count 3
//!
//! # Submit a payload, chunked through a blob when large
//! meridian submit --config client.json --kind contract_create --payload code.bin
//!
//! # Fetch the record of a transaction
//! meridian receipt --config client.json 0.0.1001@1700000000.000000001 --record
//! ```
//!
//! ## Exit codes
//!
//! - `0`: success, JSON result on stdout
//! - `1`: failure, error chain on stderr

mod cli;
mod logging;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use meridian_sdk::{
    ChunkProgress, ChunkedSubmission, Client, ClientConfig, Ed25519Signer, Error, ExecuteOptions, IdGenerator,
    Signer, TransactionId, TransactionReceiptQuery, TransactionRecordQuery,
};

use cli::{Commands, ConnectArgs, GenerateArgs, IdCommands, MeridianCli, ReceiptArgs, SubmitArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeridianCli::parse();

    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Id(IdCommands::Generate(args)) => generate_ids(&args),
        Commands::Id(IdCommands::Parse { id }) => print_json(&describe_id(&id)),
        Commands::Keygen => keygen(),
        Commands::Submit(args) => submit(args, cli.print_metrics).await,
        Commands::Receipt(args) => receipt(args, cli.print_metrics).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

fn generate_ids(args: &GenerateArgs) -> Result<()> {
    let generator = IdGenerator::default();
    for _ in 0..args.count {
        let id = generator
            .generate(args.payer)
            .with_scheduled(args.scheduled)
            .with_nonce(args.nonce);
        println!("{id}");
    }
    Ok(())
}

/// Breaks an id into its components.
fn describe_id(id: &TransactionId) -> Value {
    let valid_start = id.valid_start();
    json!({
        "transaction_id": id.to_string(),
        "payer": id.payer().map(|p| p.to_string()),
        "valid_start": valid_start.map(|t| json!({ "seconds": t.seconds(), "nanos": t.nanos() })),
        "valid_start_utc": valid_start.and_then(|t| t.to_datetime()).map(|t| t.to_rfc3339()),
        "nonce": id.nonce(),
        "scheduled": id.is_scheduled(),
    })
}

fn keygen() -> Result<()> {
    let signer = Ed25519Signer::generate();
    print_json(&json!({
        "private_key": signer.secret_key_hex(),
        "public_key": signer.public_key().to_hex(),
    }))
}

// ---------------------------------------------------------------------------
// Network commands
// ---------------------------------------------------------------------------

fn connect(args: &ConnectArgs) -> Result<Client> {
    let config = ClientConfig::from_file(&args.config)
        .with_context(|| format!("failed to load client config from {}", args.config.display()))?;
    let client = Client::from_config(&config).context("failed to build client")?;
    info!(nodes = config.network.len(), "connected");
    Ok(client)
}

async fn submit(args: SubmitArgs, print_metrics: bool) -> Result<()> {
    let client = connect(&args.connect)?;
    let payload = std::fs::read(&args.payload)
        .with_context(|| format!("failed to read payload from {}", args.payload.display()))?;

    let mut submission = ChunkedSubmission::new(args.kind, payload);
    if let Some(memo) = args.memo {
        submission = submission.memo(memo);
    }

    let progress = ChunkProgress {
        blob_id: args.resume_blob,
        offset: args.resume_offset.unwrap_or(0),
    };
    let mut options = ExecuteOptions::default();
    if let Some(secs) = args.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let result = submission.execute_from(&client, progress, options).await;
    dump_metrics(&client, print_metrics);

    match result {
        Ok(outcome) => print_json(&outcome),
        Err(Error::Chunked { progress, source }) => {
            error!(
                blob_id = ?progress.blob_id,
                offset = progress.offset,
                "upload interrupted; resume with --resume-blob and --resume-offset"
            );
            Err(anyhow::Error::new(*source).context("chunked submission failed"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("submission failed")),
    }
}

async fn receipt(args: ReceiptArgs, print_metrics: bool) -> Result<()> {
    let client = connect(&args.connect)?;
    let id = args.transaction_id;

    let result = if args.record {
        TransactionRecordQuery::new(id)
            .execute(&client)
            .await
            .map(serde_json::to_value)
    } else {
        TransactionReceiptQuery::new(id)
            .validate_status(!args.no_validate)
            .execute(&client)
            .await
            .map(serde_json::to_value)
    };
    dump_metrics(&client, print_metrics);

    let value = result
        .with_context(|| format!("failed to fetch {id}"))?
        .context("failed to encode result")?;
    print_json(&value)
}

fn dump_metrics(client: &Client, enabled: bool) {
    if !enabled {
        return;
    }
    match client.metrics().encode() {
        Ok(text) => eprint!("{text}"),
        Err(e) => error!(error = %e, "failed to encode metrics"),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}

fn print_version() {
    println!("meridian {}", env!("CARGO_PKG_VERSION"));
    println!("  rustc:    {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
    println!("  target:   {}", std::env::consts::ARCH);
    println!("  os:       {}", std::env::consts::OS);
    println!("  sdk:      meridian-sdk {}", env!("CARGO_PKG_VERSION"));
}
