//! Builder for configuring [`MokaStore`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;
use restbox_core::{CacheKey, CachedResponse};
use smol_str::SmolStr;

use crate::store::MokaStore;

/// Default cost budget: 1 GiB.
pub const DEFAULT_MAX_COST: u64 = 1 << 30;

/// Default estimate of distinct keys.
pub const DEFAULT_ESTIMATED_KEYS: u64 = 10_000_000;

/// Upper bound on slots pre-allocated from the key estimate.
const MAX_INITIAL_CAPACITY: u64 = 65_536;

/// Expiration policy that reads the TTL from [`CachedResponse::expires`].
///
/// Entries without an expiry are only removed by cost-based eviction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<CacheKey, Arc<CachedResponse>> for Expiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Arc<CachedResponse>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Self::calculate_ttl(value)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &Arc<CachedResponse>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // An update only happens when replacing an already expired entry, so
        // the new value's TTL must apply rather than the old remaining time.
        Self::calculate_ttl(value)
    }
}

impl Expiration {
    fn calculate_ttl(value: &CachedResponse) -> Option<Duration> {
        value.expires().map(|expiration| {
            let millis = (expiration - Utc::now()).num_milliseconds();
            if millis <= 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(millis as u64)
            }
        })
    }
}

/// Builder for creating and configuring a [`MokaStore`].
///
/// Use [`MokaStore::builder`] to create a new builder instance.
///
/// # Examples
///
/// ```
/// use restbox_moka::MokaStore;
///
/// // 64 MiB budget, sized for roughly ten thousand URLs
/// let store = MokaStore::builder()
///     .max_cost(64 * 1024 * 1024)
///     .estimated_keys(10_000)
///     .label("users-api")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MokaStoreBuilder {
    max_cost: u64,
    estimated_keys: u64,
    label: SmolStr,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaStoreBuilder {
    /// Creates a builder with the default budget.
    pub fn new() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
            estimated_keys: DEFAULT_ESTIMATED_KEYS,
            label: SmolStr::new_static("moka"),
            eviction_policy: None,
        }
    }

    /// Sets the maximum aggregate cost, in approximate bytes.
    ///
    /// # Default
    ///
    /// 1 GiB
    pub fn max_cost(mut self, bytes: u64) -> Self {
        self.max_cost = bytes;
        self
    }

    /// Sets the expected number of distinct keys.
    ///
    /// Used to pre-size the table, bounded so the default does not allocate
    /// ten million slots up front.
    ///
    /// # Default
    ///
    /// 10,000,000
    pub fn estimated_keys(mut self, keys: u64) -> Self {
        self.estimated_keys = keys;
        self
    }

    /// Sets a label for logs and metrics.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<SmolStr>) -> Self {
        self.label = label.into();
        self
    }

    /// Overrides the eviction policy.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::tiny_lfu()`]: LFU admission with LRU eviction. Under
    /// cost pressure TinyLFU may refuse to admit a new entry at all, which
    /// the store reports as nothing more than a later miss.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Builds the [`MokaStore`].
    pub fn build(self) -> MokaStore {
        let policy = self
            .eviction_policy
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let initial_capacity = self.estimated_keys.min(MAX_INITIAL_CAPACITY) as usize;
        let cache: Cache<CacheKey, Arc<CachedResponse>> = CacheBuilder::new(self.max_cost)
            .name(self.label.as_str())
            .initial_capacity(initial_capacity)
            .weigher(Self::cost_weigher)
            .eviction_policy(policy)
            .expire_after(Expiration)
            .build();

        MokaStore::from_parts(cache, self.label)
    }

    /// Approximate in-memory cost of an entry: key plus response footprint.
    fn cost_weigher(key: &CacheKey, value: &Arc<CachedResponse>) -> u32 {
        (key.memory_size() + value.memory_size()).min(u32::MAX as usize) as u32
    }
}

impl Default for MokaStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
