//! Client configuration.
//!
//! A [`ClientConfig`] is a plain value. It can be built in code or loaded from
//! YAML, with durations written in humantime notation:
//!
//! ```
//! use restbox::ClientConfig;
//!
//! let config = ClientConfig::from_yaml(r#"
//! name: users
//! base_url: http://localhost:8080
//! timeout: 2s
//! connect_timeout: 250ms
//! media_type: json
//! cache: true
//! default_headers:
//!   x-team: platform
//! "#).unwrap();
//!
//! assert_eq!(config.name, "users");
//! assert!(config.cache);
//! ```
//!
//! The transport derived from a configuration is built once, on first use.
//! Changing the configuration afterwards has no effect on that client.

use std::collections::BTreeMap;
use std::time::Duration;

use restbox_core::MediaType;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Options of one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Client name, used in the default user agent and in metrics.
    pub name: String,
    /// Prefix for every request path.
    pub base_url: String,
    /// Time allowed until response headers arrive (e.g. "500ms", "2s").
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Time allowed to establish a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    /// Disables both timeouts.
    pub disable_timeout: bool,
    /// Codec for request bodies and content negotiation.
    pub media_type: MediaType,
    /// Overrides the `{name}/restbox` user agent.
    pub user_agent: Option<String>,
    /// Basic credentials, ignored when `oauth` is set.
    pub basic_auth: Option<BasicAuth>,
    /// OAuth2 client credentials.
    pub oauth: Option<OAuthConfig>,
    /// Enables response caching for read-type verbs.
    pub cache: bool,
    /// Advertises and decodes gzip.
    pub gzip: bool,
    /// Wraps the transport in a tracing span per call.
    pub trace: bool,
    /// Follows up to ten redirects. Can be toggled at runtime.
    pub follow_redirects: bool,
    /// Connection pool tuning.
    pub pool: PoolConfig,
    /// Headers added to every request unless set by the call.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            name: "default".to_owned(),
            base_url: String::new(),
            timeout: None,
            connect_timeout: None,
            disable_timeout: false,
            media_type: MediaType::Json,
            user_agent: None,
            basic_auth: None,
            oauth: None,
            cache: false,
            gzip: false,
            trace: false,
            follow_redirects: true,
            pool: PoolConfig::default(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// A default configuration for `base_url`.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        ClientConfig {
            name: name.into(),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Effective response-header timeout. `None` means unbounded.
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.disable_timeout {
            return None;
        }
        Some(self.timeout.unwrap_or(DEFAULT_TIMEOUT)).filter(|t| !t.is_zero())
    }

    /// Effective connect timeout. `None` means unbounded.
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.disable_timeout {
            return None;
        }
        Some(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)).filter(|t| !t.is_zero())
    }

    /// Sets the response-header timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables both timeouts.
    pub fn without_timeouts(mut self) -> Self {
        self.disable_timeout = true;
        self
    }

    /// Sets the media type.
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    /// Enables or disables caching.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Enables or disables gzip.
    pub fn with_gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Enables or disables per-call tracing spans.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Sets whether redirects are followed.
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Overrides the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets basic credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets OAuth2 client credentials.
    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Adds a default header.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}

/// Username and password for HTTP basic authentication.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// OAuth2 client credentials grant.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Token endpoint.
    pub token_url: String,
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Requested scopes, sent space separated.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept per host.
    pub max_idle_per_host: Option<usize>,
    /// How long an idle connection is kept.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout(), Some(DEFAULT_TIMEOUT));
        assert_eq!(config.connect_timeout(), Some(DEFAULT_CONNECT_TIMEOUT));
        assert!(config.follow_redirects);
        assert_eq!(config.name, "default");
    }

    #[test]
    fn test_disabled_timeouts() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(3))
            .without_timeouts();
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let config = ClientConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.connect_timeout(), Some(DEFAULT_CONNECT_TIMEOUT));
    }

    #[test]
    fn test_yaml_full() {
        let config = ClientConfig::from_yaml(
            r#"
name: billing
base_url: https://billing.internal
timeout: 2s
connect_timeout: 100ms
media_type: xml
user_agent: billing-bot/1.0
basic_auth:
  username: svc
  password: secret
cache: true
gzip: true
follow_redirects: false
pool:
  max_idle_per_host: 8
  idle_timeout: 90s
default_headers:
  x-tenant: acme
"#,
        )
        .unwrap();

        assert_eq!(config.name, "billing");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(100)));
        assert_eq!(config.media_type, MediaType::Xml);
        assert_eq!(config.basic_auth.as_ref().unwrap().username, "svc");
        assert!(config.cache && config.gzip && !config.follow_redirects);
        assert_eq!(config.pool.max_idle_per_host, Some(8));
        assert_eq!(config.pool.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.default_headers["x-tenant"], "acme");
    }

    #[test]
    fn test_yaml_rejects_unknown_media_type() {
        assert!(ClientConfig::from_yaml("media_type: protobuf").is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = ClientConfig::default().with_basic_auth("svc", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
