//! Outbound HTTP transport.
//!
//! The gateway talks to upstream through the [`Transport`] trait so the retry
//! loop can be driven by scripted responses in tests. [`HttpTransport`] is the
//! production implementation: one pooled `reqwest` client, created once and
//! released by [`Transport::close`].

use std::error::Error as _;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::HttpTimeouts;
use crate::{GatewayError, Result};

const USER_AGENT: &str = concat!("search-gateway/", env!("CARGO_PKG_VERSION"));

/// An HTTP response as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Retry-After` header value, if any.
    pub retry_after: Option<String>,
    /// Response body.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response without a `Retry-After` header.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Sets the `Retry-After` header value.
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// Returns whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failure before any HTTP response arrived. Never contains the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// [`Transport::close`] was called. Not worth retrying.
    #[error("http client is closed")]
    Closed,

    /// Connect, timeout, DNS or body read failure.
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    /// Returns whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Performs upstream GET requests.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a GET request with the given query parameters.
    async fn get(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> std::result::Result<TransportResponse, TransportError>;

    /// Releases pooled connections. Later calls fail.
    async fn close(&self) {}
}

/// Transport backed by a shared, pooled `reqwest` client.
pub struct HttpTransport {
    client: RwLock<Option<Client>>,
}

impl HttpTransport {
    /// Builds the pooled client with the given timeouts.
    ///
    /// `reqwest` has no separate write or pool-wait timeout, so those budgets
    /// are folded into the total request deadline.
    pub fn new(timeouts: &HttpTimeouts) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .timeout(timeouts.total())
            .pool_idle_timeout(timeouts.read)
            .build()
            .map_err(|e| GatewayError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Creates a transport around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    /// Returns whether [`Transport::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.client.read().await.is_none()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> std::result::Result<TransportResponse, TransportError> {
        // Client is an Arc internally; clone it so the lock is not held
        // across the request.
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(TransportError::Closed)?;

        let response = client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(describe)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(describe)?;

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            debug!("upstream http client closed");
        }
    }
}

/// Turns a reqwest error into text, dropping the URL (it carries the API key).
fn describe(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    let prefix = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };

    let mut message = format!("{}: {}", prefix, err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::Failed(message)
}
