//! Mock endpoint substitution for tests.
//!
//! An enabled [`MockRouter`] points every request of a client at a local
//! server. Path and query are kept and the untouched URL travels along in the
//! `X-Original-Url` header. The cache key is always the original URL.

use http::HeaderName;
use url::Url;

use crate::error::ConfigError;

/// Header carrying the URL a request had before substitution.
pub const ORIGINAL_URL_HEADER: HeaderName = HeaderName::from_static("x-original-url");

/// Redirects requests to a mock endpoint. Disabled by default.
#[derive(Debug, Clone, Default)]
pub struct MockRouter {
    endpoint: Option<Url>,
}

impl MockRouter {
    /// A router that leaves URLs alone.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A router sending everything to `endpoint` (e.g. a wiremock server URI).
    pub fn to(endpoint: &str) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint).map_err(|source| ConfigError::InvalidUrl {
            url: endpoint.to_owned(),
            source,
        })?;
        Ok(MockRouter {
            endpoint: Some(endpoint),
        })
    }

    /// Whether substitution is active.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// The rewritten target for `url`, or `None` when disabled.
    pub fn rewrite(&self, url: &Url) -> Option<Url> {
        let mut target = self.endpoint.clone()?;
        target.set_path(url.path());
        target.set_query(url.query());
        Some(target)
    }
}
