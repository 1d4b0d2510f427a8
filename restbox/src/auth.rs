//! Credential injection.
//!
//! Basic credentials become a plain `Authorization` header during header
//! decoration. OAuth wraps the whole transport in a [`BearerTransport`] that
//! asks a [`TokenSource`] for a token on every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{BasicAuth, OAuthConfig};
use crate::error::{AuthError, TransportError};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

impl BasicAuth {
    /// `Authorization` header value: `Basic base64(username:password)`.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}

/// Supplies bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a currently valid access token.
    async fn token(&self) -> Result<String, AuthError>;
}

#[async_trait]
impl<T> TokenSource for Arc<T>
where
    T: TokenSource + ?Sized,
{
    async fn token(&self) -> Result<String, AuthError> {
        self.as_ref().token().await
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

/// OAuth2 client credentials grant.
///
/// The token is cached until shortly before `expires_in` runs out. Refresh
/// happens under a lock, so concurrent callers wait for a single request to
/// the token endpoint.
#[derive(Debug)]
pub struct ClientCredentials {
    http: reqwest::Client,
    config: OAuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    /// Uses `http` to talk to the token endpoint.
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        ClientCredentials {
            http,
            config,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        let form = serde_urlencoded::to_string(&params)?;

        let response = self
            .http
            .post(self.config.token_url.as_str())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(form)
            .send()
            .await
            .map_err(AuthError::Request)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(AuthError::Request)?;
        let token: TokenResponse = serde_json::from_slice(&body)?;

        debug!(token_url = %self.config.token_url, expires_in = ?token.expires_in, "fetched access token");
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: token.expires_in.map(|secs| {
                Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN)
            }),
        })
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.refresh_at.is_none_or(|at| Instant::now() < at) {
                return Ok(token.value.clone());
            }
        }
        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// Adds `Authorization: Bearer <token>` to every request of the inner
/// transport.
#[derive(Debug, Clone)]
pub struct BearerTransport<T, S> {
    inner: T,
    source: S,
}

impl<T, S> BearerTransport<T, S> {
    /// Wraps `inner`, taking tokens from `source`.
    pub fn new(inner: T, source: S) -> Self {
        BearerTransport { inner, source }
    }
}

#[async_trait]
impl<T, S> Transport for BearerTransport<T, S>
where
    T: Transport,
    S: TokenSource,
{
    async fn send(&self, mut request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let token = self.source.token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AuthError::InvalidToken)?;
        value.set_sensitive(true);
        request.headers.insert(AUTHORIZATION, value);
        self.inner.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let auth = BasicAuth {
            username: "Aladdin".into(),
            password: "open sesame".into(),
        };
        assert_eq!(
            auth.header_value().unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl TokenSource for Fixed {
        async fn token(&self) -> Result<String, AuthError> {
            Ok(self.0.to_owned())
        }
    }

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: StatusCode::OK,
                headers: request.headers,
                body: bytes::Bytes::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_bearer_header_injected() {
        let transport = BearerTransport::new(Echo, Fixed("abc"));
        let url = url::Url::parse("http://localhost/").unwrap();
        let response = transport
            .send(TransportRequest::new(http::Method::GET, url))
            .await
            .unwrap();
        assert_eq!(response.headers[AUTHORIZATION], "Bearer abc");
    }

    #[tokio::test]
    async fn test_invalid_token_is_auth_error() {
        let transport = BearerTransport::new(Echo, Fixed("bad\ntoken"));
        let url = url::Url::parse("http://localhost/").unwrap();
        let error = transport
            .send(TransportRequest::new(http::Method::GET, url))
            .await
            .unwrap_err();
        assert_eq!(error.class(), "auth");
    }
}
