//! # Node Endpoints
//!
//! A [`Node`] is one network address plus the account id that address
//! answers for. It owns two pieces of mutable state:
//!
//! - a lazily-opened channel, created on first use and cached for the life
//!   of the node;
//! - a health record tracking consecutive transport failures and the
//!   exclusion window they earned.
//!
//! Health transitions:
//!
//! ```text
//!            failure: readmit_at = now + backoff, backoff = min(2 * backoff, max)
//!  Healthy ─────────────────────────────────────────────────────▶ Excluded
//!     ▲                                                              │
//!     └──────────── readmit_at passes (or any success) ──────────────┘
//!            success: backoff = max(backoff / 2, min)
//! ```
//!
//! Only the registry mutates health; the execution engine reports outcomes
//! through it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use super::channel::{Channel, ChannelFactory, TransportError};
use crate::config::{ExecutionConfig, NODE_MAX_BACKOFF, NODE_MIN_BACKOFF};
use crate::identity::AccountId;

/// Bounds for a node's exclusion window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBackoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for NodeBackoff {
    fn default() -> Self {
        Self {
            min: NODE_MIN_BACKOFF,
            max: NODE_MAX_BACKOFF,
        }
    }
}

impl From<&ExecutionConfig> for NodeBackoff {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            min: config.node_min_backoff(),
            max: config.node_max_backoff(),
        }
    }
}

/// Exclusion used when a window does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn readmission(now: Instant, window: Duration) -> Instant {
    now.checked_add(window).unwrap_or_else(|| now + FAR_FUTURE)
}

#[derive(Debug)]
struct Health {
    consecutive_failures: u32,
    backoff: Duration,
    readmit_at: Option<Instant>,
}

/// One endpoint in the network map.
pub struct Node {
    address: String,
    account_id: AccountId,
    channel: Mutex<Option<Arc<dyn Channel>>>,
    health: RwLock<Health>,
}

impl Node {
    pub(crate) fn new(address: String, account_id: AccountId, backoff: NodeBackoff) -> Self {
        Self {
            address,
            account_id,
            channel: Mutex::new(None),
            health: RwLock::new(Health {
                consecutive_failures: 0,
                backoff: backoff.min,
                readmit_at: None,
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// True unless the node is inside an exclusion window.
    pub fn is_healthy(&self) -> bool {
        self.remaining_backoff().is_none()
    }

    /// Time left in the current exclusion window, if any.
    pub fn remaining_backoff(&self) -> Option<Duration> {
        let readmit_at = self.health.read().readmit_at?;
        let now = Instant::now();
        (readmit_at > now).then(|| readmit_at - now)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.read().consecutive_failures
    }

    /// The cached channel, opening it on first use.
    pub(crate) fn channel(&self, factory: &dyn ChannelFactory) -> Result<Arc<dyn Channel>, TransportError> {
        let mut slot = self.channel.lock();
        if let Some(channel) = slot.as_ref() {
            return Ok(Arc::clone(channel));
        }
        let channel = factory.open(&self.address)?;
        *slot = Some(Arc::clone(&channel));
        Ok(channel)
    }

    pub(crate) fn has_channel(&self) -> bool {
        self.channel.lock().is_some()
    }

    pub(crate) fn record_failure(&self, bounds: NodeBackoff) -> Duration {
        let mut health = self.health.write();
        let window = health.backoff;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.readmit_at = Some(readmission(Instant::now(), window));
        health.backoff = window.saturating_mul(2).min(bounds.max);
        window
    }

    pub(crate) fn record_success(&self, bounds: NodeBackoff) {
        let mut health = self.health.write();
        health.consecutive_failures = 0;
        health.readmit_at = None;
        health.backoff = (health.backoff / 2).max(bounds.min);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("account_id", &self.account_id)
            .field("health", &*self.health.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityId;

    fn bounds() -> NodeBackoff {
        NodeBackoff {
            min: Duration::from_secs(8),
            max: Duration::from_secs(30),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_excludes_then_readmits() {
        let node = Node::new("a:1".into(), EntityId::from_num(3), bounds());
        assert!(node.is_healthy());

        assert_eq!(node.record_failure(bounds()), Duration::from_secs(8));
        assert!(!node.is_healthy());
        assert_eq!(node.remaining_backoff(), Some(Duration::from_secs(8)));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(node.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_and_caps() {
        let node = Node::new("a:1".into(), EntityId::from_num(3), bounds());
        assert_eq!(node.record_failure(bounds()), Duration::from_secs(8));
        assert_eq!(node.record_failure(bounds()), Duration::from_secs(16));
        assert_eq!(node.record_failure(bounds()), Duration::from_secs(30));
        assert_eq!(node.record_failure(bounds()), Duration::from_secs(30));
        assert_eq!(node.consecutive_failures(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn success_readmits_and_decays() {
        let node = Node::new("a:1".into(), EntityId::from_num(3), bounds());
        node.record_failure(bounds());
        node.record_failure(bounds());
        node.record_success(bounds());
        assert!(node.is_healthy());
        assert_eq!(node.consecutive_failures(), 0);
        // Backoff was 30s after two failures; halving gives 15s.
        assert_eq!(node.record_failure(bounds()), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_window_saturates_instead_of_overflowing() {
        let huge = NodeBackoff {
            min: Duration::MAX,
            max: Duration::MAX,
        };
        let node = Node::new("a:1".into(), EntityId::from_num(3), huge);

        assert_eq!(node.record_failure(huge), Duration::MAX);
        assert_eq!(node.record_failure(huge), Duration::MAX);
        assert!(!node.is_healthy());
        assert!(node.remaining_backoff().unwrap() >= FAR_FUTURE - Duration::from_secs(1));
    }
}
