//! Client and request builders.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{HeaderMap, Method};
use once_cell::sync::OnceCell;
use restbox_core::CacheStore;
use serde::Serialize;
use url::Url;

use crate::bound::{Bound, Pool, parse_header};
use crate::config::ClientConfig;
use crate::context::CallContext;
use crate::error::{ConfigError, Error};
use crate::fsm::Dispatch;
use crate::mock::MockRouter;
use crate::response::Response;
use crate::shared_cache;

/// State shared by all clones of a [`RestClient`].
pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) mock: MockRouter,
    pool: Option<Pool>,
    follow_redirects: Arc<AtomicBool>,
    cache_enabled: AtomicBool,
    bound: OnceCell<Bound>,
}

impl Inner {
    /// Builds the transport on first call. Concurrent first callers block
    /// until the single build finishes. A failed build is retried by the next
    /// caller.
    pub(crate) fn bound(&self) -> Result<&Bound, ConfigError> {
        self.bound.get_or_try_init(|| {
            Bound::build(&self.config, self.pool.as_ref(), &self.follow_redirects)
        })
    }

    pub(crate) fn caching(&self) -> bool {
        self.cache_enabled.load(Ordering::Relaxed)
    }
}

/// HTTP client with response caching.
///
/// Cloning is cheap; clones share the transport, cache store and runtime
/// toggles.
///
/// ```no_run
/// use restbox::{ClientConfig, RestClient};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RestClient::new(ClientConfig::new("users", "http://localhost:8080").with_cache(true))?;
/// let response = client.get("/user").send().await?;
/// if let Some(error) = response.error() {
///     eprintln!("request failed: {error}");
/// } else if response.is_ok() {
///     let users: Vec<User> = response.deserialize()?;
///     println!("{} users, cached: {}", users.len(), response.cache_hit());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("name", &self.inner.config.name)
            .field("base_url", &self.inner.config.base_url)
            .field("cache", &self.caching())
            .field("store", &self.inner.store.label())
            .field("mock", &self.inner.mock.is_enabled())
            .finish()
    }
}

impl RestClient {
    /// A client using the shared cache store and no mock routing.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Starts a builder for `config`.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            store: None,
            mock: MockRouter::disabled(),
            pool: None,
        }
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether read-type requests use the cache.
    pub fn caching(&self) -> bool {
        self.inner.caching()
    }

    /// Turns caching on or off for subsequent requests. Entries already stored
    /// stay in the store.
    pub fn set_caching(&self, enabled: bool) {
        self.inner.cache_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether redirects are followed.
    pub fn follow_redirects(&self) -> bool {
        self.inner.follow_redirects.load(Ordering::Relaxed)
    }

    /// Changes redirect handling without rebuilding the transport.
    pub fn set_follow_redirects(&self, follow: bool) {
        self.inner.follow_redirects.store(follow, Ordering::Relaxed);
    }

    /// Starts a request with an arbitrary method.
    ///
    /// `path` is appended to the base URL. An absolute `http(s)://` URL is
    /// used as is.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            context: CallContext::background(),
            error: None,
        }
    }

    /// Starts a GET request.
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Starts a HEAD request.
    pub fn head(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::OPTIONS, path)
    }

    fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let full = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            let base = self.inner.config.base_url.trim_end_matches('/');
            match path {
                "" => base.to_owned(),
                path if path.starts_with('/') => format!("{base}{path}"),
                path => format!("{base}/{path}"),
            }
        };
        Url::parse(&full).map_err(|source| ConfigError::InvalidUrl { url: full, source })
    }
}

/// Builder for [`RestClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CacheStore>>,
    mock: MockRouter,
    pool: Option<Pool>,
}

impl ClientBuilder {
    /// Uses `store` instead of [`shared_cache`].
    pub fn store(mut self, store: impl CacheStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Routes every request to a mock endpoint.
    pub fn mock(mut self, mock: MockRouter) -> Self {
        self.mock = mock;
        self
    }

    /// Replaces or customizes the connection pool.
    pub fn pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validates the base URL and creates the client. The transport itself is
    /// built on first request.
    pub fn build(self) -> Result<RestClient, ConfigError> {
        if !self.config.base_url.is_empty() {
            Url::parse(&self.config.base_url).map_err(|source| ConfigError::InvalidUrl {
                url: self.config.base_url.clone(),
                source,
            })?;
        }
        let store = self.store.unwrap_or_else(|| shared_cache() as Arc<dyn CacheStore>);
        let inner = Inner {
            follow_redirects: Arc::new(AtomicBool::new(self.config.follow_redirects)),
            cache_enabled: AtomicBool::new(self.config.cache),
            config: self.config,
            store,
            mock: self.mock,
            pool: self.pool,
            bound: OnceCell::new(),
        };
        Ok(RestClient {
            inner: Arc::new(inner),
        })
    }
}

/// A request being assembled.
///
/// Builder errors (bad header, unencodable body) are kept and returned from
/// [`send`](Self::send) before anything goes on the wire.
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder {
    client: RestClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    context: CallContext,
    error: Option<Error>,
}

impl RequestBuilder {
    /// Adds a header. Per-call headers override every header the client sets.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(error) => {
                self.error.get_or_insert(error.into());
            }
        }
        self
    }

    /// Adds several headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Sets the deadline and cancellation for this call.
    pub fn context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Encodes `value` with the client's media type.
    pub fn body<T>(mut self, value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match self.client.inner.config.media_type.marshal(value) {
            Ok(bytes) => self.body = Some(bytes),
            Err(error) => {
                self.error.get_or_insert(error.into());
            }
        }
        self
    }

    /// Sends `bytes` without encoding.
    pub fn raw_body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(bytes.into());
        self
    }

    /// Runs the dispatch pipeline.
    ///
    /// Transport failures are reported through [`Response::error`], not as
    /// `Err`.
    pub async fn send(self) -> Result<Response, Error> {
        self.into_dispatch()?.run().await
    }

    pub(crate) fn into_dispatch(self) -> Result<Dispatch, Error> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let url = self.client.resolve(&self.path)?;
        Ok(Dispatch {
            inner: self.client.inner,
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            context: self.context,
        })
    }

    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}
