#![warn(missing_docs)]
//! # restbox-moka
//!
//! Bounded in-memory [`CacheStore`](restbox_core::CacheStore) for restbox,
//! built on [Moka](https://github.com/moka-rs/moka).
//!
//! Entries are weighed by their approximate memory footprint and evicted with
//! TinyLFU once the cost budget is exhausted. Entries with a TTL expire on
//! their own; entries without one stay until evicted.
//!
//! ```
//! use restbox_moka::MokaStore;
//!
//! let store = MokaStore::builder().max_cost(32 * 1024 * 1024).build();
//! ```

mod builder;
pub mod metrics;
mod store;

pub use builder::{DEFAULT_ESTIMATED_KEYS, DEFAULT_MAX_COST, MokaStoreBuilder};
pub use moka::policy::EvictionPolicy;
pub use store::MokaStore;
