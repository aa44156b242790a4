//! # CLI Argument Parsing
//!
//! Defines the command-line interface for `meridian` using `clap` derive
//! macros. Every command prints JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use meridian_sdk::{AccountId, BlobId, TransactionId};

use crate::logging::LogFormat;

/// Meridian network client.
///
/// Generates and inspects transaction ids, submits payloads of any size and
/// fetches receipts and records.
#[derive(Parser, Debug)]
#[command(
    name = "meridian",
    version,
    about = "Meridian network client",
    long_about = None,
    propagate_version = true
)]
pub struct MeridianCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty, env = "MERIDIAN_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Default log level when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "warn", env = "MERIDIAN_LOG_LEVEL")]
    pub log_level: String,

    /// Dump execution metrics to stderr after a network command.
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate or parse transaction ids.
    #[command(subcommand)]
    Id(IdCommands),

    /// Generate a fresh Ed25519 operator key.
    Keygen,

    /// Submit a payload, chunking it through a blob when it is large.
    Submit(SubmitArgs),

    /// Fetch the receipt (or record) of a transaction.
    Receipt(ReceiptArgs),

    /// Display version and build information.
    Version,
}

/// Transaction id subcommands. These never touch the network.
#[derive(Subcommand, Debug)]
pub enum IdCommands {
    /// Generate ids for a payer.
    Generate(GenerateArgs),

    /// Parse an id and print its components.
    Parse {
        /// Id in `shard.realm.num@seconds.nanos[?scheduled][/nonce]` form.
        id: TransactionId,
    },
}

/// Arguments for `meridian id generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Paying account, e.g. `0.0.1001`.
    #[arg(long)]
    pub payer: AccountId,

    /// How many ids to generate. They strictly increase.
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Mark the ids as scheduled.
    #[arg(long)]
    pub scheduled: bool,

    /// Attach a nonce.
    #[arg(long)]
    pub nonce: Option<u32>,
}

/// Network connection shared by commands that talk to nodes.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Client configuration file (JSON).
    #[arg(long, env = "MERIDIAN_CONFIG")]
    pub config: PathBuf,
}

/// Arguments for `meridian submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Domain operation kind, e.g. `contract_create`.
    #[arg(long)]
    pub kind: String,

    /// File holding the payload bytes.
    #[arg(long)]
    pub payload: PathBuf,

    /// Memo attached to every transaction of the submission.
    #[arg(long)]
    pub memo: Option<String>,

    /// Bound on the whole submission, in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Resume an interrupted upload into this blob.
    #[arg(long, requires = "resume_offset")]
    pub resume_blob: Option<BlobId>,

    /// Bytes already stored in the resumed blob.
    #[arg(long, requires = "resume_blob")]
    pub resume_offset: Option<usize>,
}

/// Arguments for `meridian receipt`.
#[derive(Args, Debug)]
pub struct ReceiptArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Transaction to look up.
    pub transaction_id: TransactionId,

    /// Fetch the full record instead of the receipt.
    #[arg(long)]
    pub record: bool,

    /// Return the receipt even when consensus rejected the transaction.
    #[arg(long, conflicts_with = "record")]
    pub no_validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use meridian_sdk::EntityId;

    #[test]
    fn verify_cli_structure() {
        MeridianCli::command().debug_assert();
    }

    #[test]
    fn parses_id_generate() {
        let cli = MeridianCli::parse_from([
            "meridian", "id", "generate", "--payer", "0.0.1001", "--count", "3", "--nonce", "2",
        ]);
        match cli.command {
            Commands::Id(IdCommands::Generate(args)) => {
                assert_eq!(args.payer, EntityId::from_num(1001));
                assert_eq!(args.count, 3);
                assert_eq!(args.nonce, Some(2));
                assert!(!args.scheduled);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_transaction_ids() {
        let result = MeridianCli::try_parse_from(["meridian", "id", "parse", "0.0.1001"]);
        assert!(result.is_err());
    }

    #[test]
    fn resume_flags_come_together() {
        let result = MeridianCli::try_parse_from([
            "meridian", "submit", "--config", "c.json", "--kind", "k", "--payload", "p.bin", "--resume-offset",
            "8",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = MeridianCli::parse_from([
            "meridian",
            "receipt",
            "--config",
            "c.json",
            "0.0.1001@1700000000.000000001",
            "--log-format",
            "json",
            "--record",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Receipt(args) => {
                assert!(args.record);
                assert_eq!(args.connect.config, PathBuf::from("c.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
