//! Moka store capacity metrics.
//!
//! Enable the `metrics` feature to record them.
//!
//! ## Metrics
//!
//! - `restbox_moka_entries` - Current number of entries in the store (gauge)
//! - `restbox_moka_cost` - Current aggregate entry cost in approximate bytes (gauge)
//!
//! Both carry a `store` label to tell several stores apart.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for the entry count gauge.
    pub static ref MOKA_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "restbox_moka_entries",
            "Current number of entries in the Moka response store."
        );
        "restbox_moka_entries"
    };

    /// Metric name for the cost gauge.
    pub static ref MOKA_COST: &'static str = {
        metrics::describe_gauge!(
            "restbox_moka_cost",
            "Current aggregate cost of the Moka response store in approximate bytes."
        );
        "restbox_moka_cost"
    };
}

/// Records current entry count and aggregate cost for `store`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_capacity(store: &str, entries: u64, cost: u64) {
    metrics::gauge!(*MOKA_ENTRIES, "store" => store.to_string()).set(entries as f64);
    metrics::gauge!(*MOKA_COST, "store" => store.to_string()).set(cost as f64);
}

/// No-op when the `metrics` feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_capacity(_store: &str, _entries: u64, _cost: u64) {}
