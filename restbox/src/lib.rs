#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
mod bound;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
mod fsm;
pub mod metrics;
pub mod mock;
pub mod response;
pub mod spawn;
pub mod transport;

use std::sync::Arc;

use once_cell::sync::Lazy;
use restbox_moka::MokaStore;

pub use bound::{Pool, PoolCustomizer};
pub use client::{ClientBuilder, RequestBuilder, RestClient};
pub use config::{BasicAuth, ClientConfig, OAuthConfig, PoolConfig};
pub use context::{CallContext, CancelCause, CancelHandle};
pub use error::{AuthError, ConfigError, DeserializeError, Error, TransportError};
pub use mock::MockRouter;
pub use response::{Response, fill_up};
pub use spawn::{Concurrent, DispatchResult, FutureResponse};
pub use transport::{Transport, TransportRequest, TransportResponse};

pub use restbox_core::{
    Admission, CacheKey, CacheStore, CachedResponse, CodecError, MediaType, Problem, Validators,
};

static SHARED_CACHE: Lazy<Arc<MokaStore>> =
    Lazy::new(|| Arc::new(MokaStore::builder().label("shared").build()));

/// Process-wide default store, used by clients built without
/// [`ClientBuilder::store`].
///
/// Entries are keyed by URL only, so every client using it shares them.
pub fn shared_cache() -> Arc<MokaStore> {
    SHARED_CACHE.clone()
}
