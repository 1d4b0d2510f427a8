//! Freshness and validator extraction from response headers.
//!
//! [`Validators::extract`] derives everything the cache needs from a response:
//!
//! - **TTL** - `max-age` (or `s-maxage`) from `Cache-Control`, otherwise a
//!   future `Expires` date
//! - **Last-Modified** - parsed HTTP-date
//! - **ETag** - raw header value, quotes included
//!
//! A response without a TTL but with a validator must be revalidated before
//! reuse. A response with none of the three signals is not cacheable.
//!
//! ```
//! use http::HeaderMap;
//! use restbox_core::Validators;
//!
//! let mut headers = HeaderMap::new();
//! headers.insert("etag", "\"1234\"".parse().unwrap());
//!
//! let validators = Validators::extract(&headers);
//! assert!(validators.revalidate());
//! assert!(validators.is_cacheable());
//! assert_eq!(validators.etag(), Some("\"1234\""));
//! ```
//!
//! Malformed header values count as absent, never as errors.

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use http::header::{CACHE_CONTROL, ETAG, EXPIRES, LAST_MODIFIED};

use crate::date::parse_http_date;

/// Cache-relevant metadata of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    expires: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    etag: Option<String>,
    revalidate: bool,
}

impl Validators {
    /// Extracts validators relative to the current time.
    pub fn extract(headers: &HeaderMap) -> Self {
        Self::extract_at(headers, Utc::now())
    }

    /// Extracts validators relative to `now`.
    pub fn extract_at(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let expires = ttl_from_cache_control(headers, now).or_else(|| {
            header_str(headers, EXPIRES)
                .and_then(parse_http_date)
                .filter(|expires| *expires > now)
        });
        let last_modified = header_str(headers, LAST_MODIFIED).and_then(parse_http_date);
        let etag = header_str(headers, ETAG)
            .filter(|etag| !etag.is_empty())
            .map(str::to_owned);

        let revalidate = expires.is_none() && (last_modified.is_some() || etag.is_some());

        Validators {
            expires,
            last_modified,
            etag,
            revalidate,
        }
    }

    /// Absolute expiry derived from `max-age` or `Expires`.
    #[inline]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// Parsed `Last-Modified` timestamp.
    #[inline]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// `ETag` value, verbatim.
    #[inline]
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// True when freshness has no TTL but a validator is available.
    #[inline]
    pub fn revalidate(&self) -> bool {
        self.revalidate
    }

    /// True when the response carries a TTL.
    #[inline]
    pub fn has_ttl(&self) -> bool {
        self.expires.is_some()
    }

    /// Admission eligibility: any of TTL, Last-Modified or ETag is present.
    #[inline]
    pub fn is_cacheable(&self) -> bool {
        self.expires.is_some() || self.last_modified.is_some() || self.etag.is_some()
    }

    /// Whether the TTL has passed at `now`. Entries without a TTL never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Heap bytes held by the validators.
    pub(crate) fn heap_size(&self) -> usize {
        self.etag.as_ref().map_or(0, String::capacity)
    }
}

fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn ttl_from_cache_control(headers: &HeaderMap, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(max_age)?;
    let seconds = i64::try_from(seconds).ok()?;
    Duration::try_seconds(seconds).and_then(|ttl| now.checked_add_signed(ttl))
}

/// Reads a positive `max-age`, falling back to `s-maxage`, from one
/// `Cache-Control` header value.
pub fn max_age(cache_control: &str) -> Option<u64> {
    let mut shared = None;
    for directive in cache_control.split(',') {
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };
        let seconds = value.trim().trim_matches('"').parse::<u64>().ok();
        match name.trim().to_ascii_lowercase().as_str() {
            "max-age" => {
                if let Some(seconds) = seconds.filter(|s| *s > 0) {
                    return Some(seconds);
                }
            }
            "s-maxage" => shared = shared.or(seconds.filter(|s| *s > 0)),
            _ => {}
        }
    }
    shared
}
