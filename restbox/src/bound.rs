//! One-time transport construction.
//!
//! A [`RestClient`](crate::RestClient) keeps its configuration and builds the
//! [`Bound`] state from it on first use. Concurrent first callers wait for a
//! single build and then share the result.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::auth::{BearerTransport, ClientCredentials};
use crate::config::ClientConfig;
use crate::error::ConfigError;
use crate::transport::{ReqwestTransport, TracedTransport, Transport};

/// Hook applied to the default pool builder before timeouts are set.
pub type PoolCustomizer =
    Arc<dyn Fn(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + Sync>;

/// Replacement for the default connection pool.
#[derive(Clone)]
pub enum Pool {
    /// A ready transport used as is. Configured timeouts are not applied to it.
    Transport(Arc<dyn Transport>),
    /// Adjusts the pool builder. Timeouts, gzip and redirect policy from the
    /// configuration are applied on top.
    Configure(PoolCustomizer),
}

impl Pool {
    /// Shorthand for [`Pool::Configure`].
    pub fn configure<F>(customize: F) -> Self
    where
        F: Fn(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + Sync + 'static,
    {
        Pool::Configure(Arc::new(customize))
    }

    /// Shorthand for [`Pool::Transport`].
    pub fn transport(transport: impl Transport + 'static) -> Self {
        Pool::Transport(Arc::new(transport))
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::Transport(_) => f.write_str("Pool::Transport"),
            Pool::Configure(_) => f.write_str("Pool::Configure"),
        }
    }
}

/// State derived once from a configuration.
pub(crate) struct Bound {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) default_headers: HeaderMap,
    pub(crate) user_agent: HeaderValue,
    pub(crate) basic_auth: Option<HeaderValue>,
}

impl Bound {
    pub(crate) fn build(
        config: &ClientConfig,
        pool: Option<&Pool>,
        follow_redirects: &Arc<AtomicBool>,
    ) -> Result<Self, ConfigError> {
        let mut transport: Arc<dyn Transport> = match pool {
            Some(Pool::Transport(transport)) => transport.clone(),
            Some(Pool::Configure(customize)) => Arc::new(ReqwestTransport::configure(
                customize(reqwest::Client::builder()),
                config,
                follow_redirects.clone(),
            )?),
            None => Arc::new(ReqwestTransport::from_config(
                config,
                follow_redirects.clone(),
            )?),
        };

        if config.trace {
            transport = Arc::new(TracedTransport::new(transport, config.name.as_str()));
        }
        if let Some(oauth) = &config.oauth {
            let source = ClientCredentials::new(token_client(config)?, oauth.clone());
            transport = Arc::new(BearerTransport::new(transport, source));
        }

        let user_agent = match &config.user_agent {
            Some(agent) => agent.clone(),
            None => format!("{}/restbox", config.name),
        };
        let user_agent = HeaderValue::from_str(&user_agent)
            .map_err(|_| ConfigError::InvalidHeaderValue("user-agent".to_owned()))?;

        let basic_auth = match (&config.oauth, &config.basic_auth) {
            (None, Some(basic)) => Some(basic.header_value().ok_or_else(|| {
                ConfigError::InvalidHeaderValue(AUTHORIZATION.as_str().to_owned())
            })?),
            _ => None,
        };

        let default_headers = parse_headers(
            config
                .default_headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;

        debug!(
            client = %config.name,
            trace = config.trace,
            oauth = config.oauth.is_some(),
            custom_pool = pool.is_some(),
            "transport built"
        );

        Ok(Bound {
            transport,
            default_headers,
            user_agent,
            basic_auth,
        })
    }
}

fn token_client(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(ConfigError::Transport)
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigError::InvalidHeaderName(name.to_owned()))?;
    let value =
        HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue(name.to_owned()))?;
    Ok((header, value))
}

fn parse_headers<'a>(
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let (name, value) = parse_header(name, value)?;
        headers.append(name, value);
    }
    Ok(headers)
}
