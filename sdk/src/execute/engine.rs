//! # Execution State Machine
//!
//! One loop drives every request type:
//!
//! ```text
//!   Building ─▶ Signing ─▶ Dispatching ─▶ AwaitingClassification
//!      ▲                        │                 │
//!      │            transport   │                 ├── Success  ─▶ Succeeded
//!      │            error       ▼                 ├── Terminal ─▶ Failed
//!      └────────────────── RotatingNode           └── Retry    ─▶ Retrying ─▶ Dispatching
//! ```
//!
//! - A retriable status keeps the node and waits
//!   `min(min_backoff * 2^(attempt-1), max_backoff)` (or the executable's own
//!   schedule).
//! - A retriable transport error marks the node unhealthy and moves to an
//!   untried node, rebuilding and re-signing the request for it. At most
//!   `max_node_attempts` distinct nodes are tried.
//! - Every dispatch counts toward `max_attempts`. Every wait races the
//!   overall deadline and the caller's cancellation signal.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::{ExecuteOptions, Executable};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::identity::AccountId;
use crate::network::{Node, NodeRegistry, TransportError, WireRequest, WireResponse};
use crate::status::{Disposition, Status};

/// States an execution passes through. Traced at `debug` on every
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Building,
    Signing,
    Dispatching,
    AwaitingClassification,
    Retrying,
    RotatingNode,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::Signing => "signing",
            Self::Dispatching => "dispatching",
            Self::AwaitingClassification => "awaiting_classification",
            Self::Retrying => "retrying",
            Self::RotatingNode => "rotating_node",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened on one dispatch. Lives for one loop iteration.
#[derive(Debug)]
pub struct ExecutionAttempt {
    pub attempt_number: u32,
    pub node: AccountId,
    pub sent_at: Instant,
    pub precheck: Option<Status>,
    pub transport_error: Option<TransportError>,
}

impl ExecutionAttempt {
    fn start(attempt_number: u32, node: AccountId) -> Self {
        Self {
            attempt_number,
            node,
            sent_at: Instant::now(),
            precheck: None,
            transport_error: None,
        }
    }

    fn log(&self, request: &'static str) {
        debug!(
            request,
            attempt = self.attempt_number,
            node = %self.node,
            precheck = ?self.precheck,
            transport_error = ?self.transport_error,
            elapsed = ?self.sent_at.elapsed(),
            "attempt finished"
        );
    }
}

/// Races every wait against the deadline and the cancel signal.
struct Guard {
    started: Instant,
    /// `None` when the timeout reaches past what an `Instant` can hold.
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Guard {
    async fn wait<F: Future>(&mut self, fut: F, last: &mut Option<Error>) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel) => Err(Error::Cancelled),
            _ = expired(self.deadline) => Err(Error::Timeout {
                elapsed: self.started.elapsed(),
                last: last.take().map(Box::new),
            }),
            out = fut => Ok(out),
        }
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Resolves once the signal reads `true`. Never resolves without a signal,
/// or once its sender is gone.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

async fn dispatch(
    registry: &NodeRegistry,
    node: &Node,
    request: WireRequest,
    attempt_timeout: Duration,
) -> std::result::Result<WireResponse, TransportError> {
    let channel = registry.channel(node)?;
    match tokio::time::timeout(attempt_timeout, channel.call(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::DeadlineExceeded),
    }
}

fn trace_state(request: &'static str, attempt: u32, node: AccountId, state: ExecutionState) {
    debug!(request, attempt, node = %node, state = %state, "execution state");
}

/// Runs `executable` to completion. All execution modes end up here.
pub async fn execute<E>(executable: &E, client: &Client, options: ExecuteOptions) -> Result<E::Output>
where
    E: Executable + ?Sized,
{
    let metrics = client.metrics();
    metrics
        .requests_total
        .with_label_values(&[executable.label()])
        .inc();

    let result = run(executable, client, options).await;
    if let Err(err) = &result {
        metrics.record_failure(err.kind());
        debug!(
            request = executable.label(),
            transaction_id = %executable.transaction_id(),
            error = %err,
            "execution failed"
        );
    }
    result
}

async fn run<E>(executable: &E, client: &Client, options: ExecuteOptions) -> Result<E::Output>
where
    E: Executable + ?Sized,
{
    let config = client.execution_config();
    let registry = client.registry();
    let metrics = client.metrics();
    let label = executable.label();
    let pinned = executable.node_account_ids();
    let max_attempts = executable.max_attempts(client).max(1);

    let started = Instant::now();
    let timeout = options
        .timeout
        .unwrap_or_else(|| executable.request_timeout(client));
    let mut guard = Guard {
        started,
        deadline: started.checked_add(timeout),
        cancel: options.cancel,
    };

    let mut tried: HashSet<String> = HashSet::new();
    let mut last_error: Option<Error> = None;
    let mut node = registry.select_node(&tried, pinned)?;

    for attempt in 1..=max_attempts {
        if let Some(wait) = node.remaining_backoff() {
            debug!(request = label, node = %node.account_id(), wait = ?wait, "waiting for node readmission");
            guard.wait(sleep(wait), &mut last_error).await?;
        }
        tried.insert(node.address().to_string());
        let account = node.account_id();

        trace_state(label, attempt, account, ExecutionState::Building);
        let request = executable.make_request(client, account)?;

        trace_state(label, attempt, account, ExecutionState::Dispatching);
        metrics.attempts_total.with_label_values(&[label]).inc();
        let mut record = ExecutionAttempt::start(attempt, account);
        let outcome = guard
            .wait(
                dispatch(registry, &node, request.clone(), config.attempt_timeout()),
                &mut last_error,
            )
            .await?;
        metrics
            .attempt_latency_seconds
            .observe(record.sent_at.elapsed().as_secs_f64());

        match outcome {
            Ok(response) => {
                record.precheck = Some(response.precheck);
                record.log(label);
                registry.mark_success(&node);

                trace_state(label, attempt, account, ExecutionState::AwaitingClassification);
                match executable.classify(&response) {
                    Disposition::Success => {
                        trace_state(label, attempt, account, ExecutionState::Succeeded);
                        return executable.map_response(response, account, &request);
                    }
                    Disposition::Terminal => {
                        trace_state(label, attempt, account, ExecutionState::Failed);
                        return Err(executable.map_status_error(&response));
                    }
                    Disposition::Retry => {
                        last_error = Some(executable.map_status_error(&response));
                        if attempt == max_attempts {
                            break;
                        }
                        let delay = executable.retry_delay(attempt, client);
                        trace_state(label, attempt, account, ExecutionState::Retrying);
                        warn!(
                            request = label,
                            transaction_id = %executable.transaction_id(),
                            attempt,
                            node = %account,
                            precheck = %response.precheck,
                            consensus_status = ?response.consensus_status,
                            delay = ?delay,
                            "retrying on same node"
                        );
                        metrics.retries_total.inc();
                        guard.wait(sleep(delay), &mut last_error).await?;
                    }
                }
            }
            Err(err) if err.is_retriable() => {
                record.transport_error = Some(err.clone());
                record.log(label);
                registry.mark_failure(&node);

                if tried.len() >= config.max_node_attempts {
                    trace_state(label, attempt, account, ExecutionState::Failed);
                    return Err(Error::NodesExhausted {
                        tried: tried.len(),
                        last: err,
                    });
                }
                last_error = Some(Error::Transport(err.clone()));
                if attempt == max_attempts {
                    break;
                }

                let next = registry.select_node(&tried, pinned)?;
                if tried.contains(next.address()) {
                    trace_state(label, attempt, account, ExecutionState::Failed);
                    return Err(Error::NodesExhausted {
                        tried: tried.len(),
                        last: err,
                    });
                }

                trace_state(label, attempt, account, ExecutionState::RotatingNode);
                warn!(
                    request = label,
                    transaction_id = %executable.transaction_id(),
                    attempt,
                    from = %account,
                    to = %next.account_id(),
                    error = %err,
                    "rotating to another node"
                );
                metrics.node_rotations_total.inc();
                node = next;
            }
            Err(err) => {
                record.transport_error = Some(err.clone());
                record.log(label);
                trace_state(label, attempt, account, ExecutionState::Failed);
                return Err(Error::Transport(err));
            }
        }
    }

    Err(Error::MaxAttemptsExceeded {
        attempts: max_attempts,
        last: Box::new(
            last_error.unwrap_or_else(|| Error::Internal("no attempt completed".into())),
        ),
    })
}
