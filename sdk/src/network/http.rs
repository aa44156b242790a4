//! JSON-RPC over HTTP channels, backed by `reqwest`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::trace;

use super::channel::{Channel, ChannelFactory, TransportError, WireRequest, WireResponse};
use super::rpc::{RpcRequest, RpcResponse};

/// TCP connect timeout for new channels. Whole-call deadlines are enforced
/// by the execution engine.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A channel to one node's JSON-RPC endpoint.
#[derive(Debug)]
pub struct HttpChannel {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpChannel {
    /// `address` may be a full URL or a bare `host:port`, which is taken to
    /// mean plain HTTP.
    pub fn new(client: reqwest::Client, address: &str) -> Self {
        let url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Channel for HttpChannel {
    async fn call(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = RpcRequest::from_wire(id, &request)
            .map_err(|e| TransportError::Malformed(format!("encode request: {e}")))?;

        trace!(url = %self.url, id, method = request.label(), "sending rpc");

        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(TransportError::Unavailable(format!("{} returned 503", self.url)))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(TransportError::ResourceExhausted(format!(
                    "{} returned 429",
                    self.url
                )))
            }
            status if !status.is_success() => {
                return Err(TransportError::Rejected(format!("{} returned {status}", self.url)))
            }
            _ => {}
        }

        let body: RpcResponse = response.json().await.map_err(map_reqwest_error)?;

        if let Some(error) = body.error {
            return Err(TransportError::Rejected(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| TransportError::Malformed("rpc response missing result".into()))?;
        serde_json::from_value(result).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::DeadlineExceeded
    } else if err.is_connect() || err.is_request() {
        TransportError::ConnectionFailed(err.to_string())
    } else if err.is_decode() {
        TransportError::Malformed(err.to_string())
    } else {
        TransportError::ConnectionFailed(err.to_string())
    }
}

/// Opens [`HttpChannel`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpChannelFactory {
    client: reqwest::Client,
}

impl HttpChannelFactory {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

impl ChannelFactory for HttpChannelFactory {
    fn open(&self, address: &str) -> Result<Arc<dyn Channel>, TransportError> {
        Ok(Arc::new(HttpChannel::new(self.client.clone(), address)))
    }
}
