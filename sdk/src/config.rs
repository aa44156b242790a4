//! # Client Configuration & Constants
//!
//! Every retry, polling and chunking knob lives here, either as a `pub const`
//! default or as a field of one of the policy structs below. If a number
//! shows up in the engine that isn't traceable to this file, it's a bug.
//!
//! The structs use `_ms: u64` fields rather than `Duration` so that they
//! deserialize from plain JSON without a custom format. Each exposes
//! `Duration` accessors for the code that consumes it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::AccountId;

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Upper bound on dispatches for a single logical request, across all nodes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// First retry delay. Doubles per attempt up to [`DEFAULT_MAX_BACKOFF`].
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Ceiling for the per-request retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Deadline for one dispatch to one node.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wall-clock cap for a whole execution, retries included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Distinct nodes an execution may rotate through before giving up.
pub const DEFAULT_MAX_NODE_ATTEMPTS: usize = 10;

// ---------------------------------------------------------------------------
// Node health
// ---------------------------------------------------------------------------

/// Exclusion window after a node's first transport failure.
pub const NODE_MIN_BACKOFF: Duration = Duration::from_secs(8);

/// Exclusion windows double per consecutive failure and stop growing here.
pub const NODE_MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// Receipt polling
// ---------------------------------------------------------------------------

/// Delay after the first unsuccessful receipt poll.
pub const POLL_BASE_INTERVAL: Duration = Duration::from_millis(500);

/// Added to the poll delay after every unsuccessful poll.
pub const POLL_INTERVAL_STEP: Duration = Duration::from_millis(250);

/// Poll delays never exceed this.
pub const POLL_MAX_INTERVAL: Duration = Duration::from_secs(8);

/// Polls per receipt before giving up.
pub const POLL_MAX_ATTEMPTS: u32 = 40;

/// Wall-clock cap for receipt polling.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Largest payload slice carried by one transaction. Payloads at or below
/// this size go inline.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Most slices a chunked submission may be split into.
pub const DEFAULT_MAX_CHUNKS: usize = 20;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// How long after its valid start a transaction may still be accepted.
pub const DEFAULT_VALID_DURATION_SECS: u64 = 120;

/// Default fee ceiling the operator is willing to pay per transaction.
pub const DEFAULT_MAX_TRANSACTION_FEE: u64 = 200_000_000;

/// Longest memo a node accepts, in bytes.
pub const MAX_MEMO_LENGTH: usize = 100;

// ---------------------------------------------------------------------------
// Policy structs
// ---------------------------------------------------------------------------

/// Retry, rotation and deadline policy for the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum dispatches per logical request.
    pub max_attempts: u32,

    /// First retry delay in milliseconds.
    pub min_backoff_ms: u64,

    /// Retry delay ceiling in milliseconds.
    pub max_backoff_ms: u64,

    /// Per-dispatch deadline in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Overall deadline in milliseconds.
    pub request_timeout_ms: u64,

    /// Distinct nodes one execution may try.
    pub max_node_attempts: usize,

    /// Initial node exclusion window after a transport failure.
    pub node_min_backoff_ms: u64,

    /// Largest node exclusion window.
    pub node_max_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff_ms: DEFAULT_MIN_BACKOFF.as_millis() as u64,
            max_backoff_ms: DEFAULT_MAX_BACKOFF.as_millis() as u64,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            max_node_attempts: DEFAULT_MAX_NODE_ATTEMPTS,
            node_min_backoff_ms: NODE_MIN_BACKOFF.as_millis() as u64,
            node_max_backoff_ms: NODE_MAX_BACKOFF.as_millis() as u64,
        }
    }
}

impl ExecutionConfig {
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn node_min_backoff(&self) -> Duration {
        Duration::from_millis(self.node_min_backoff_ms)
    }

    pub fn node_max_backoff(&self) -> Duration {
        Duration::from_millis(self.node_max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("execution.max_attempts must be at least 1"));
        }
        if self.max_node_attempts == 0 {
            return Err(ConfigError::invalid("execution.max_node_attempts must be at least 1"));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::invalid(
                "execution.min_backoff_ms exceeds execution.max_backoff_ms",
            ));
        }
        if self.node_min_backoff_ms > self.node_max_backoff_ms {
            return Err(ConfigError::invalid(
                "execution.node_min_backoff_ms exceeds execution.node_max_backoff_ms",
            ));
        }
        if self.attempt_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("execution timeouts must be non-zero"));
        }
        Ok(())
    }
}

/// Receipt/record polling cadence.
///
/// The first poll goes out immediately. After unsuccessful poll `n`
/// (1-based) the poller waits
/// `min(base_interval + interval_step * (n - 1), max_interval)`: a gentle
/// linear ramp, since consensus usually lands within a few seconds and
/// doubling would overshoot it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub base_interval_ms: u64,
    pub interval_step_ms: u64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: POLL_BASE_INTERVAL.as_millis() as u64,
            interval_step_ms: POLL_INTERVAL_STEP.as_millis() as u64,
            max_interval_ms: POLL_MAX_INTERVAL.as_millis() as u64,
            max_attempts: POLL_MAX_ATTEMPTS,
            timeout_ms: POLL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PollConfig {
    /// Delay after unsuccessful poll number `poll` (1-based).
    pub fn delay_for(&self, poll: u32) -> Duration {
        let steps = u64::from(poll.saturating_sub(1));
        let ms = self
            .base_interval_ms
            .saturating_add(self.interval_step_ms.saturating_mul(steps))
            .min(self.max_interval_ms);
        Duration::from_millis(ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("polling.max_attempts must be at least 1"));
        }
        if self.base_interval_ms > self.max_interval_ms {
            return Err(ConfigError::invalid(
                "polling.base_interval_ms exceeds polling.max_interval_ms",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("polling.timeout_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Large-payload splitting policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Bytes per slice. Payloads no larger than this are sent inline.
    pub chunk_size: usize,

    /// Slices allowed per submission; larger payloads are refused up front.
    pub max_chunks: usize,

    /// Delete the temporary blob once the referencing transaction lands.
    pub delete_blob_after: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            delete_blob_after: true,
        }
    }
}

impl ChunkConfig {
    /// Number of slices `len` bytes split into. Zero-length payloads still
    /// occupy one (inline) slice.
    pub fn chunks_for(&self, len: usize) -> usize {
        if len == 0 {
            1
        } else {
            len.div_ceil(self.chunk_size.max(1))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunking.chunk_size must be non-zero"));
        }
        if self.max_chunks == 0 {
            return Err(ConfigError::invalid("chunking.max_chunks must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-level configuration
// ---------------------------------------------------------------------------

/// The account that pays for and signs transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub account_id: AccountId,

    /// Hex-encoded 32-byte Ed25519 secret key.
    pub private_key: String,
}

/// Everything needed to build a [`Client`](crate::client::Client) from a file.
///
/// ```json
/// {
///   "network": { "http://127.0.0.1:50211": "0.0.3" },
///   "operator": { "account_id": "0.0.1001", "private_key": "9d61..." },
///   "execution": { "max_attempts": 5 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node address → node account id.
    pub network: BTreeMap<String, AccountId>,

    #[serde(default)]
    pub operator: Option<OperatorConfig>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub polling: PollConfig,

    #[serde(default)]
    pub chunking: ChunkConfig,
}

impl ClientConfig {
    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.is_empty() {
            return Err(ConfigError::invalid("network must list at least one node"));
        }
        if let Some(operator) = &self.operator {
            if operator.private_key.trim().is_empty() {
                return Err(ConfigError::invalid("operator.private_key is empty"));
            }
        }
        self.execution.validate()?;
        self.polling.validate()?;
        self.chunking.validate()
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(msg: &str) -> Self {
        Self::Invalid(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{ "network": { "http://127.0.0.1:50211": "0.0.3" } }"#;

    #[test]
    fn test_defaults_match_constants() {
        let exec = ExecutionConfig::default();
        assert_eq!(exec.max_attempts, 10);
        assert_eq!(exec.min_backoff(), Duration::from_millis(250));
        assert_eq!(exec.max_backoff(), Duration::from_secs(8));
        assert_eq!(exec.node_max_backoff(), Duration::from_secs(3600));

        let chunk = ChunkConfig::default();
        assert_eq!(chunk.chunk_size, 4096);
        assert_eq!(chunk.max_chunks, 20);
        assert!(chunk.delete_blob_after);
    }

    #[test]
    fn test_poll_delay_ramps_linearly_then_caps() {
        let poll = PollConfig::default();
        assert_eq!(poll.delay_for(1), Duration::from_millis(500));
        assert_eq!(poll.delay_for(2), Duration::from_millis(750));
        assert_eq!(poll.delay_for(5), Duration::from_millis(1500));
        assert_eq!(poll.delay_for(1000), Duration::from_secs(8));
    }

    #[test]
    fn test_chunks_for_boundaries() {
        let chunk = ChunkConfig::default();
        assert_eq!(chunk.chunks_for(0), 1);
        assert_eq!(chunk.chunks_for(4096), 1);
        assert_eq!(chunk.chunks_for(4097), 2);
        assert_eq!(chunk.chunks_for(4096 * 20), 20);
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let config = ClientConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.network.len(), 1);
        assert!(config.operator.is_none());
        assert_eq!(config.execution, ExecutionConfig::default());
        assert_eq!(config.polling, PollConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let raw = r#"{
            "network": { "a:1": "0.0.3" },
            "execution": { "max_attempts": 3 }
        }"#;
        let config = ClientConfig::from_json_str(raw).unwrap();
        assert_eq!(config.execution.max_attempts, 3);
        assert_eq!(config.execution.min_backoff_ms, 250);
    }

    #[test]
    fn test_empty_network_rejected() {
        let err = ClientConfig::from_json_str(r#"{ "network": {} }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let raw = r#"{
            "network": { "a:1": "0.0.3" },
            "execution": { "min_backoff_ms": 9000, "max_backoff_ms": 1000 }
        }"#;
        assert!(matches!(
            ClientConfig::from_json_str(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_account_id_is_json_error() {
        let raw = r#"{ "network": { "a:1": "zero.zero.three" } }"#;
        assert!(matches!(
            ClientConfig::from_json_str(raw),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.network.get("http://127.0.0.1:50211"),
            Some(&AccountId::from_num(3))
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ClientConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
