//! # Execution Engine
//!
//! Turns one logical request into as many node dispatches as it takes.
//!
//! An [`Executable`] says how to build a request for a given node and how
//! to read the reply; [`execute`] owns the loop (see [`engine`] for the
//! state machine). The same loop serves three calling styles:
//!
//! - [`execute`]: `async`, for callers already on a Tokio runtime;
//! - [`execute_blocking`]: parks the calling thread on a private
//!   current-thread runtime;
//! - [`spawn_execute`]: runs on the ambient runtime and hands back an
//!   [`ExecutionHandle`] that can be awaited or given a completion callback.
//!
//! Identical node behaviour yields identical outcomes in all three.
//!
//! ## Design Decisions
//!
//! - Completion is a single `Result<T, Error>`. There is no way to observe
//!   both a value and an error, or neither.
//! - Cancellation is a `watch::Receiver<bool>`, the same shutdown idiom the
//!   rest of the stack uses. Flipping it to `true` abandons any sleep or
//!   in-flight dispatch and returns [`Error::Cancelled`].

pub mod backoff;
pub mod engine;
pub mod metrics;

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::identity::{AccountId, TransactionId};
use crate::network::{WireRequest, WireResponse};
use crate::status::Disposition;

pub use engine::{execute, ExecutionAttempt, ExecutionState};
pub use metrics::ExecutionMetrics;

/// A request the engine knows how to drive.
///
/// `make_request` is called once per dispatch with the node chosen for that
/// dispatch, so anything node-specific (the body's node account, the
/// signatures over it) is rebuilt every time.
pub trait Executable: Send + Sync {
    type Output: Send;

    /// Short name for logs and metric labels.
    fn label(&self) -> &'static str;

    /// The transaction this request is for.
    fn transaction_id(&self) -> TransactionId;

    /// Restricts dispatch to nodes serving these accounts. Empty means any.
    fn node_account_ids(&self) -> &[AccountId] {
        &[]
    }

    /// Builds (and, for transactions, signs) the request for one node.
    fn make_request(&self, client: &Client, node_account_id: AccountId) -> Result<WireRequest>;

    /// Decides what a reply means.
    fn classify(&self, response: &WireResponse) -> Disposition;

    /// Converts a successful reply into the caller's value.
    fn map_response(
        &self,
        response: WireResponse,
        node_account_id: AccountId,
        request: &WireRequest,
    ) -> Result<Self::Output>;

    /// The error for a reply that was not a success.
    fn map_status_error(&self, response: &WireResponse) -> Error;

    /// Dispatch budget. Defaults to the client's execution policy.
    fn max_attempts(&self, client: &Client) -> u32 {
        client.execution_config().max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based) before retrying.
    fn retry_delay(&self, attempt: u32, client: &Client) -> Duration {
        let config = client.execution_config();
        backoff::exponential(attempt, config.min_backoff(), config.max_backoff())
    }

    fn request_timeout(&self, client: &Client) -> Duration {
        client.execution_config().request_timeout()
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Overall deadline. Defaults to the executable's own.
    pub timeout: Option<Duration>,

    /// Cancellation signal; `true` means stop.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Splits one caller deadline across a sequence of executions.
pub(crate) struct Budget {
    started: Instant,
    /// `None` when unbounded, or too far out to represent.
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Budget {
    pub(crate) fn new(options: ExecuteOptions) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: options.timeout.and_then(|timeout| started.checked_add(timeout)),
            cancel: options.cancel,
        }
    }

    /// Options for one execution: its own default deadline, cut short by
    /// whatever remains of the overall one.
    pub(crate) fn options(&self, default: Duration) -> Result<ExecuteOptions> {
        let timeout = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(Error::Timeout {
                        elapsed: self.started.elapsed(),
                        last: None,
                    });
                }
                remaining.min(default)
            }
            None => default,
        };
        Ok(ExecuteOptions {
            timeout: Some(timeout),
            cancel: self.cancel.clone(),
        })
    }
}

/// Runs `executable` on a private current-thread runtime, blocking the
/// calling thread until it finishes.
///
/// Must not be called from inside an async context; use [`execute`] there.
pub fn execute_blocking<E>(executable: &E, client: &Client, options: ExecuteOptions) -> Result<E::Output>
where
    E: Executable + ?Sized,
{
    block_on(execute(executable, client, options))
}

/// Drives `fut` to completion on a fresh current-thread runtime.
pub(crate) fn block_on<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::Internal(
            "blocking execution requested from inside an async runtime".into(),
        ));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("failed to start runtime: {e}")))?;
    runtime.block_on(fut)
}

/// Starts `executable` on the current Tokio runtime.
pub fn spawn_execute<E>(executable: E, client: Client, options: ExecuteOptions) -> Result<ExecutionHandle<E::Output>>
where
    E: Executable + 'static,
    E::Output: 'static,
{
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|_| Error::Internal("spawn_execute requires a Tokio runtime".into()))?;
    let task = handle.spawn(async move { execute(&executable, &client, options).await });
    Ok(ExecutionHandle { task })
}

/// A running execution. Resolves to its result when awaited.
#[derive(Debug)]
pub struct ExecutionHandle<T> {
    task: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> ExecutionHandle<T> {
    /// Calls `callback` with the result once the execution finishes.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }

    /// Abandons the execution. Awaiting the handle afterwards yields
    /// [`Error::Cancelled`].
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl<T> Future for ExecutionHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(match ready!(Pin::new(&mut self.task).poll(cx)) {
            Ok(result) => result,
            Err(join) if join.is_cancelled() => Err(Error::Cancelled),
            Err(join) => Err(Error::Internal(format!("execution task failed: {join}"))),
        })
    }
}
