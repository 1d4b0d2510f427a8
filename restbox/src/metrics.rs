//! Metrics declaration and recording.
//!
//! Enable the `metrics` feature to emit them. Without it every recorder is a
//! no-op, and recording never affects the dispatch outcome.
//!
//! ## Metrics
//!
//! - `restbox_requests_total` - dispatches by `client`, `method`, `event`
//!   (`cache_hit`, `not_modified`, `response`, `error`) and `outcome`
//!   (status code or error class)
//! - `restbox_request_duration_seconds` - dispatch latency by `client` and
//!   `method`
//! - `restbox_cache_admission_total` - admission attempts by `store` and
//!   `outcome`

use std::time::Duration;

use restbox_core::Admission;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of dispatches.
    pub static ref REQUEST_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_requests_total",
            "Total number of dispatched requests."
        );
        "restbox_requests_total"
    };
    /// Histogram of dispatch duration.
    pub static ref REQUEST_DURATION: &'static str = {
        metrics::describe_histogram!(
            "restbox_request_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of dispatched requests in seconds."
        );
        "restbox_request_duration_seconds"
    };
    /// Track number of cache admission attempts.
    pub static ref CACHE_ADMISSION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_cache_admission_total",
            "Total number of cache admission attempts."
        );
        "restbox_cache_admission_total"
    };
}

/// Records one finished dispatch.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_request(client: &str, method: &str, event: &'static str, outcome: &str, elapsed: Duration) {
    metrics::counter!(
        *REQUEST_COUNTER,
        "client" => client.to_string(),
        "method" => method.to_string(),
        "event" => event,
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!(
        *REQUEST_DURATION,
        "client" => client.to_string(),
        "method" => method.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Records one finished dispatch (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_request(_client: &str, _method: &str, _event: &'static str, _outcome: &str, _elapsed: Duration) {}

/// Records an admission attempt.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_admission(store: &str, admission: Admission) {
    metrics::counter!(
        *CACHE_ADMISSION_COUNTER,
        "store" => store.to_string(),
        "outcome" => admission.as_str()
    )
    .increment(1);
}

/// Records an admission attempt (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_admission(_store: &str, _admission: Admission) {}
