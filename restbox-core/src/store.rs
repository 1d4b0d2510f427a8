//! Cache store trait.
//!
//! A [`CacheStore`] maps a [`CacheKey`] to a [`CachedResponse`]. It is a cache,
//! not a durable store: lookups may miss at any time and admission may be
//! silently refused, so neither operation returns an error.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cached::CachedResponse;
use crate::key::CacheKey;

/// Outcome of [`CacheStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The response was handed to the store. It may still be dropped later
    /// under cost pressure.
    Admitted,
    /// A live entry already occupied the key; the new response was discarded.
    Occupied,
}

impl Admission {
    /// Returns the outcome as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Admission::Admitted => "admitted",
            Admission::Occupied => "occupied",
        }
    }
}

/// Bounded store of cached responses, safe for unbounded concurrent callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up a live entry.
    ///
    /// Entries past their TTL are reported as absent even if they have not been
    /// evicted yet. The returned copy is flagged as a cache hit.
    async fn get(&self, key: &CacheKey) -> Option<CachedResponse>;

    /// Stores `response` unless a live entry already exists for `key`.
    ///
    /// The first writer wins; a concurrent second completion for the same key
    /// is discarded rather than overwriting.
    async fn insert_if_absent(&self, key: CacheKey, response: CachedResponse) -> Admission;

    /// Label identifying this store in logs and metrics.
    fn label(&self) -> &str {
        "cache"
    }
}

#[async_trait]
impl<T> CacheStore for Arc<T>
where
    T: CacheStore + ?Sized,
{
    async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.as_ref().get(key).await
    }

    async fn insert_if_absent(&self, key: CacheKey, response: CachedResponse) -> Admission {
        self.as_ref().insert_if_absent(key, response).await
    }

    fn label(&self) -> &str {
        self.as_ref().label()
    }
}
