//! # Client
//!
//! The handle every request executes against. A [`Client`] owns the node
//! registry (and through it the channel cache), the operator, the id
//! generator, the retry/poll/chunk policies and the metrics registry.
//!
//! Clients are cheap to clone; clones share all of the above, so node
//! health learned by one request benefits the next.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::{ChunkConfig, ClientConfig, ExecutionConfig, PollConfig};
use crate::crypto::{Ed25519Signer, Signer};
use crate::error::{Error, Result};
use crate::execute::ExecutionMetrics;
use crate::identity::{AccountId, Clock, IdGenerator, SystemClock, TransactionId};
use crate::network::{ChannelFactory, HttpChannelFactory, NodeBackoff, NodeRegistry};

/// The account that pays for transactions, and its key.
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub signer: Arc<dyn Signer>,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.signer.public_key())
            .finish()
    }
}

struct ClientInner {
    registry: NodeRegistry,
    operator: Option<Operator>,
    generator: IdGenerator,
    execution: ExecutionConfig,
    polling: PollConfig,
    chunking: ChunkConfig,
    metrics: ExecutionMetrics,
}

/// Shared entry point for executing requests.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Builds an HTTP-backed client from a loaded configuration file.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .network(config.network.clone())
            .execution_config(config.execution.clone())
            .poll_config(config.polling.clone())
            .chunk_config(config.chunking.clone());

        if let Some(operator) = &config.operator {
            let signer = Ed25519Signer::from_hex(&operator.private_key)
                .map_err(crate::crypto::SignError::from)?;
            builder = builder.operator(operator.account_id, Arc::new(signer));
        }

        builder.build()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.inner.registry
    }

    pub fn operator(&self) -> Option<&Operator> {
        self.inner.operator.as_ref()
    }

    pub fn execution_config(&self) -> &ExecutionConfig {
        &self.inner.execution
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.inner.polling
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.inner.chunking
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.inner.metrics
    }

    pub fn id_generator(&self) -> &IdGenerator {
        &self.inner.generator
    }

    /// A fresh transaction id paid for by the operator.
    pub fn generate_transaction_id(&self) -> Result<TransactionId> {
        let operator = self
            .operator()
            .ok_or(Error::NoOperator("generate transaction ids"))?;
        Ok(self.inner.generator.generate(operator.account_id))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("registry", &self.inner.registry)
            .field("operator", &self.inner.operator)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`Client`]. Only the network map is required.
#[derive(Default)]
pub struct ClientBuilder {
    network: BTreeMap<String, AccountId>,
    factory: Option<Arc<dyn ChannelFactory>>,
    operator: Option<Operator>,
    clock: Option<Arc<dyn Clock>>,
    execution: ExecutionConfig,
    polling: PollConfig,
    chunking: ChunkConfig,
}

impl ClientBuilder {
    /// Node address → node account id.
    pub fn network(mut self, network: impl IntoIterator<Item = (String, AccountId)>) -> Self {
        self.network = network.into_iter().collect();
        self
    }

    /// Replaces the default HTTP transport.
    pub fn channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn operator(mut self, account_id: AccountId, signer: Arc<dyn Signer>) -> Self {
        self.operator = Some(Operator { account_id, signer });
        self
    }

    /// Clock for transaction id generation.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn execution_config(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.polling = config;
        self
    }

    pub fn chunk_config(mut self, config: ChunkConfig) -> Self {
        self.chunking = config;
        self
    }

    pub fn build(self) -> Result<Client> {
        self.execution.validate()?;
        self.polling.validate()?;
        self.chunking.validate()?;

        let factory: Arc<dyn ChannelFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(HttpChannelFactory::new()?),
        };
        let registry = NodeRegistry::new(self.network, factory, NodeBackoff::from(&self.execution))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = ExecutionMetrics::new()
            .map_err(|e| Error::Internal(format!("metrics registration failed: {e}")))?;

        info!(
            nodes = registry.len(),
            operator = ?self.operator.as_ref().map(|op| op.account_id),
            max_attempts = self.execution.max_attempts,
            "client ready"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                registry,
                operator: self.operator,
                generator: IdGenerator::new(clock),
                execution: self.execution,
                polling: self.polling,
                chunking: self.chunking,
                metrics,
            }),
        })
    }
}
