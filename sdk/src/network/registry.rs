//! # Node Registry
//!
//! The set of candidate nodes for a client, keyed by address. Owns every
//! channel and is the only thing that changes node health.
//!
//! ## Selection
//!
//! [`NodeRegistry::select_node`] picks, in order of preference:
//!
//! 1. a uniformly random healthy node not yet tried by this request;
//! 2. the untried node whose exclusion window ends soonest;
//! 3. a random healthy node, tried or not;
//! 4. whichever node's exclusion window ends soonest.
//!
//! Callers that must not reuse a node check the returned address against
//! their exclusion set.
//!
//! ## Concurrency
//!
//! Selection takes only short per-node read locks and never holds more than
//! one at a time. Health writes are per node. Channel creation takes the
//! node's channel mutex, so concurrent first uses of one endpoint open a
//! single channel.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use super::channel::{Channel, ChannelFactory, TransportError};
use super::node::{Node, NodeBackoff};
use crate::error::{Error, Result};
use crate::identity::AccountId;

/// The client's view of the network.
pub struct NodeRegistry {
    nodes: Vec<Arc<Node>>,
    by_address: HashMap<String, usize>,
    factory: Arc<dyn ChannelFactory>,
    backoff: NodeBackoff,
}

impl NodeRegistry {
    /// Builds a registry from an address → account id map.
    ///
    /// Fails with [`Error::EmptyNetwork`] if the map is empty.
    pub fn new(
        network: BTreeMap<String, AccountId>,
        factory: Arc<dyn ChannelFactory>,
        backoff: NodeBackoff,
    ) -> Result<Self> {
        if network.is_empty() {
            return Err(Error::EmptyNetwork);
        }

        let nodes: Vec<Arc<Node>> = network
            .into_iter()
            .map(|(address, account_id)| Arc::new(Node::new(address, account_id, backoff)))
            .collect();
        let by_address = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.address().to_string(), i))
            .collect();

        debug!(nodes = nodes.len(), "node registry initialised");

        Ok(Self {
            nodes,
            by_address,
            factory,
            backoff,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; construction rejects empty networks.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// The account id served at `address`.
    pub fn resolve(&self, address: &str) -> Result<AccountId> {
        self.by_address
            .get(address)
            .map(|&i| self.nodes[i].account_id())
            .ok_or_else(|| Error::UnknownNode(address.to_string()))
    }

    /// Some endpoint serving `account_id`, preferring healthy ones.
    pub fn node_for_account(&self, account_id: AccountId) -> Option<Arc<Node>> {
        let mut matching = self.nodes.iter().filter(|n| n.account_id() == account_id);
        let first = matching.next()?;
        if first.is_healthy() {
            return Some(Arc::clone(first));
        }
        matching
            .find(|n| n.is_healthy())
            .or(Some(first))
            .map(Arc::clone)
    }

    /// Picks a node for the next dispatch.
    ///
    /// `tried` holds addresses this request already used. `pinned`, when
    /// non-empty, restricts candidates to nodes serving those accounts.
    pub fn select_node(&self, tried: &HashSet<String>, pinned: &[AccountId]) -> Result<Arc<Node>> {
        let candidates: Vec<&Arc<Node>> = if pinned.is_empty() {
            self.nodes.iter().collect()
        } else {
            self.nodes
                .iter()
                .filter(|n| pinned.contains(&n.account_id()))
                .collect()
        };

        if candidates.is_empty() {
            let wanted: Vec<String> = pinned.iter().map(ToString::to_string).collect();
            return Err(Error::UnknownNode(wanted.join(", ")));
        }

        let (untried, tried_nodes): (Vec<&Arc<Node>>, Vec<&Arc<Node>>) = candidates
            .into_iter()
            .partition(|n| !tried.contains(n.address()));

        let chosen = pick(&untried)
            .or_else(|| pick(&tried_nodes))
            .ok_or_else(|| Error::Internal("node selection found no candidates".into()))?;

        Ok(Arc::clone(chosen))
    }

    /// A channel and node account for a fresh request.
    pub fn select_channel(&self) -> Result<(Arc<dyn Channel>, AccountId)> {
        let node = self.select_node(&HashSet::new(), &[])?;
        let channel = self.channel(&node)?;
        Ok((channel, node.account_id()))
    }

    /// The node's channel, opening it on first use.
    pub fn channel(&self, node: &Node) -> std::result::Result<Arc<dyn Channel>, TransportError> {
        let fresh = !node.has_channel();
        let channel = node.channel(self.factory.as_ref())?;
        if fresh {
            debug!(node = %node.account_id(), address = node.address(), "opened channel");
        }
        Ok(channel)
    }

    /// Records a transport failure against `node`, excluding it for a while.
    pub fn mark_failure(&self, node: &Node) -> Duration {
        let window = node.record_failure(self.backoff);
        warn!(
            node = %node.account_id(),
            address = node.address(),
            failures = node.consecutive_failures(),
            excluded_for = ?window,
            "node marked unhealthy"
        );
        window
    }

    /// Records a successful exchange with `node`.
    pub fn mark_success(&self, node: &Node) {
        if node.consecutive_failures() > 0 {
            debug!(node = %node.account_id(), "node recovered");
        }
        node.record_success(self.backoff);
    }
}

/// Random healthy node, else the one readmitted soonest.
fn pick<'a>(nodes: &[&'a Arc<Node>]) -> Option<&'a Arc<Node>> {
    let healthy: Vec<&Arc<Node>> = nodes.iter().copied().filter(|n| n.is_healthy()).collect();
    if let Some(node) = healthy.choose(&mut rand::thread_rng()) {
        return Some(*node);
    }
    nodes
        .iter()
        .copied()
        .min_by_key(|n| n.remaining_backoff().unwrap_or_default())
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityId;
    use crate::mock::MockNetwork;

    fn network(n: u64) -> BTreeMap<String, AccountId> {
        (0..n)
            .map(|i| (format!("node-{i}:50211"), EntityId::from_num(3 + i)))
            .collect()
    }

    fn registry(n: u64) -> (NodeRegistry, MockNetwork) {
        let mock = MockNetwork::new();
        let registry =
            NodeRegistry::new(network(n), Arc::new(mock.clone()), NodeBackoff::default()).unwrap();
        (registry, mock)
    }

    #[test]
    fn empty_network_fails_fast() {
        let err = NodeRegistry::new(
            BTreeMap::new(),
            Arc::new(MockNetwork::new()),
            NodeBackoff::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EmptyNetwork));
    }

    #[test]
    fn resolve_known_and_unknown() {
        let (registry, _) = registry(2);
        assert_eq!(registry.resolve("node-1:50211").unwrap(), EntityId::from_num(4));
        assert!(matches!(registry.resolve("nope:1"), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn selection_skips_tried_nodes() {
        let (registry, _) = registry(3);
        let mut tried = HashSet::new();
        for _ in 0..3 {
            let node = registry.select_node(&tried, &[]).unwrap();
            assert!(tried.insert(node.address().to_string()));
        }
        // Everything tried: falls back to a tried node rather than failing.
        let node = registry.select_node(&tried, &[]).unwrap();
        assert!(tried.contains(node.address()));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_avoids_unhealthy_nodes() {
        let (registry, _) = registry(2);
        let bad = Arc::clone(&registry.nodes()[0]);
        registry.mark_failure(&bad);
        for _ in 0..20 {
            let node = registry.select_node(&HashSet::new(), &[]).unwrap();
            assert_eq!(node.address(), "node-1:50211");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_unhealthy_picks_soonest_readmitted() {
        let (registry, _) = registry(2);
        let a = Arc::clone(&registry.nodes()[0]);
        let b = Arc::clone(&registry.nodes()[1]);
        registry.mark_failure(&a);
        registry.mark_failure(&a); // a now excluded for 16s
        registry.mark_failure(&b); // b excluded for 8s
        let node = registry.select_node(&HashSet::new(), &[]).unwrap();
        assert_eq!(node.address(), b.address());
    }

    #[test]
    fn pinned_selection_honours_accounts() {
        let (registry, _) = registry(4);
        for _ in 0..20 {
            let node = registry
                .select_node(&HashSet::new(), &[EntityId::from_num(5)])
                .unwrap();
            assert_eq!(node.account_id(), EntityId::from_num(5));
        }
        assert!(matches!(
            registry.select_node(&HashSet::new(), &[EntityId::from_num(999)]),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn channels_are_opened_once_per_node() {
        let (registry, mock) = registry(1);
        let node = Arc::clone(&registry.nodes()[0]);
        registry.channel(&node).unwrap();
        registry.channel(&node).unwrap();
        registry.select_channel().unwrap();
        assert_eq!(mock.opened_channels(), 1);
    }

    #[test]
    fn node_for_account_finds_endpoint() {
        let (registry, _) = registry(3);
        let node = registry.node_for_account(EntityId::from_num(4)).unwrap();
        assert_eq!(node.address(), "node-1:50211");
        assert!(registry.node_for_account(EntityId::from_num(42)).is_none());
    }
}
