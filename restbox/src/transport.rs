//! Network transport.
//!
//! [`Transport`] is the seam between the dispatch pipeline and the network.
//! The default implementation is [`ReqwestTransport`]; [`TracedTransport`]
//! and [`BearerTransport`](crate::auth::BearerTransport) decorate any
//! transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use reqwest::redirect::{Attempt, Policy};
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};

/// Redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// A fully decorated outgoing request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL, after mock substitution.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded body.
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// A request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        TransportRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A received response with its body fully read.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body bytes, decompressed.
    pub body: Bytes,
}

/// Sends one request and returns its response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.as_ref().send(request).await
    }
}

/// Transport over a pooled [`reqwest::Client`].
///
/// The connect timeout is enforced by the client itself. The request timeout
/// starts once the connection is up: the client's read timeout stops a
/// response whose headers never arrive, and the whole exchange up to the
/// headers is additionally capped at connect plus request timeout. Reading the
/// body afterwards is not bounded by it.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    header_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Wraps a prebuilt client.
    pub fn new(client: reqwest::Client, header_timeout: Option<Duration>) -> Self {
        ReqwestTransport {
            client,
            header_timeout,
            connect_timeout: None,
        }
    }

    /// Declares the connect timeout the wrapped client enforces, so the
    /// header wait does not count connection setup against the request
    /// timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Builds the pooled client for `config`.
    ///
    /// `follow_redirects` is read on every redirect, so flipping it affects
    /// later calls without rebuilding the pool.
    pub fn from_config(
        config: &ClientConfig,
        follow_redirects: Arc<AtomicBool>,
    ) -> Result<Self, ConfigError> {
        Self::configure(reqwest::Client::builder(), config, follow_redirects)
    }

    /// Applies timeouts, pool settings and redirect policy from `config` to a
    /// caller supplied builder.
    pub fn configure(
        builder: reqwest::ClientBuilder,
        config: &ClientConfig,
        follow_redirects: Arc<AtomicBool>,
    ) -> Result<Self, ConfigError> {
        let mut builder = builder
            .gzip(config.gzip)
            .redirect(redirect_policy(follow_redirects));
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.read_timeout(timeout);
        }
        if let Some(max_idle) = config.pool.max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }
        if let Some(idle) = config.pool.idle_timeout {
            builder = builder.pool_idle_timeout(idle);
        }
        let client = builder.build().map_err(ConfigError::Transport)?;
        Ok(Self::new(client, config.request_timeout()).with_connect_timeout(config.connect_timeout()))
    }

    /// Upper bound for the wait on response headers, connection setup
    /// included.
    fn header_deadline(&self) -> Option<Duration> {
        self.header_timeout
            .map(|timeout| timeout + self.connect_timeout.unwrap_or_default())
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        match self.header_timeout {
            Some(timeout) if error.is_timeout() && !error.is_connect() => {
                TransportError::HeaderTimeout(timeout)
            }
            _ => TransportError::from_reqwest(error),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn redirect_policy(follow: Arc<AtomicBool>) -> Policy {
    Policy::custom(move |attempt: Attempt| {
        if !follow.load(Ordering::Relaxed) {
            attempt.error("redirects are disabled for this client")
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let request = builder.build().map_err(TransportError::from_reqwest)?;

        let execute = self.client.execute(request);
        let response = match (self.header_deadline(), self.header_timeout) {
            (Some(deadline), Some(timeout)) => tokio::time::timeout(deadline, execute)
                .await
                .map_err(|_| TransportError::HeaderTimeout(timeout))?,
            _ => execute.await,
        }
        .map_err(|error| self.classify(error))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Logs every exchange of the wrapped transport inside a `restbox.send` span.
#[derive(Debug, Clone)]
pub struct TracedTransport<T> {
    inner: T,
    client: Arc<str>,
}

impl<T> TracedTransport<T> {
    /// Wraps `inner`, labelling spans with the client name.
    pub fn new(inner: T, client: impl Into<Arc<str>>) -> Self {
        TracedTransport {
            inner,
            client: client.into(),
        }
    }
}

#[async_trait]
impl<T> Transport for TracedTransport<T>
where
    T: Transport,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let span = info_span!(
            "restbox.send",
            client = %self.client,
            method = %request.method,
            url = %request.url,
        );
        async {
            let started = Instant::now();
            let result = self.inner.send(request).await;
            let elapsed = started.elapsed();
            match &result {
                Ok(response) => debug!(
                    status = response.status.as_u16(),
                    bytes = response.body.len(),
                    ?elapsed,
                    "exchange completed"
                ),
                Err(error) => warn!(class = error.class(), %error, ?elapsed, "exchange failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
