//! Moka-backed response store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use restbox_core::{Admission, CacheKey, CacheStore, CachedResponse};
use smol_str::SmolStr;
use tracing::trace;

use crate::builder::MokaStoreBuilder;
use crate::metrics::record_capacity;

/// In-memory response store powered by Moka.
///
/// Cloning is cheap and shares the underlying cache.
///
/// # Caveats
///
/// - Expiration in Moka is best-effort, so lookups re-check the TTL and treat
///   stale entries as absent
/// - Admission under cost pressure is decided by TinyLFU and may reject a
///   freshly inserted entry
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<CacheKey, Arc<CachedResponse>>,
    label: SmolStr,
}

impl MokaStore {
    /// Creates a builder with default settings.
    pub fn builder() -> MokaStoreBuilder {
        MokaStoreBuilder::new()
    }

    pub(crate) fn from_parts(cache: Cache<CacheKey, Arc<CachedResponse>>, label: SmolStr) -> Self {
        MokaStore { cache, label }
    }

    /// Underlying Moka cache.
    pub fn cache(&self) -> &Cache<CacheKey, Arc<CachedResponse>> {
        &self.cache
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Approximate aggregate cost of live entries.
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn record(&self) {
        record_capacity(
            &self.label,
            self.cache.entry_count(),
            self.cache.weighted_size(),
        );
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        MokaStoreBuilder::new().build()
    }
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .field("cost", &self.cache.weighted_size())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let entry = self.cache.get(key).await?;
        if entry.is_expired_at(Utc::now()) {
            trace!(store = %self.label, %key, "entry past ttl");
            return None;
        }
        Some(entry.as_hit())
    }

    async fn insert_if_absent(&self, key: CacheKey, response: CachedResponse) -> Admission {
        let now = Utc::now();
        let response = Arc::new(response);
        // Check and write happen under the entry lock: a live occupant wins,
        // an occupant past its TTL is replaced.
        let result = self
            .cache
            .entry(key.clone())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if !entry.value().is_expired_at(now) => Op::Nop,
                    _ => Op::Put(response),
                };
                std::future::ready(op)
            })
            .await;

        let admission = match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => Admission::Admitted,
            _ => Admission::Occupied,
        };

        trace!(store = %self.label, %key, admission = admission.as_str(), "insert");
        self.record();
        admission
    }

    fn label(&self) -> &str {
        &self.label
    }
}
