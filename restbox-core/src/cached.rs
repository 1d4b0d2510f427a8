//! Completed HTTP exchanges kept for reuse.

use std::mem::size_of;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};

use crate::problem::Problem;
use crate::validators::Validators;

/// A response stored in (or read from) a cache store.
///
/// The body is reference counted and never mutated after construction, so
/// cloning an entry shares its bytes. The only field that changes after
/// admission is [`cache_hit`](Self::cache_hit), which is set on the copy a
/// store hands back from a lookup.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    problem: Option<Arc<Problem>>,
    validators: Validators,
    cache_hit: bool,
}

impl CachedResponse {
    /// Builds an entry from a received response, extracting validators and
    /// any problem payload.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let validators = Validators::extract(&headers);
        let problem = Problem::detect(&headers, &body).map(Arc::new);
        Self::from_parts(status, headers, body, problem, validators)
    }

    /// Builds an entry from already extracted parts.
    pub fn from_parts(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        problem: Option<Arc<Problem>>,
        validators: Validators,
    ) -> Self {
        CachedResponse {
            status,
            headers,
            body,
            problem,
            validators,
            cache_hit: false,
        }
    }

    /// Status code of the stored response.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers of the stored response.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parsed problem payload, if the response carried one.
    #[inline]
    pub fn problem(&self) -> Option<&Arc<Problem>> {
        self.problem.as_ref()
    }

    /// Freshness and validator metadata.
    #[inline]
    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    /// Absolute expiry, if the entry is time-boxed.
    #[inline]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.validators.expires()
    }

    /// True when the entry must be revalidated before reuse.
    #[inline]
    pub fn revalidate(&self) -> bool {
        self.validators.revalidate()
    }

    /// True for copies returned from a cache lookup.
    #[inline]
    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Returns a copy flagged as a cache hit. The body is shared, not copied.
    pub fn as_hit(&self) -> Self {
        CachedResponse {
            cache_hit: true,
            ..self.clone()
        }
    }

    /// Whether the TTL has passed at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.validators.is_expired_at(now)
    }

    /// Consumes the entry and returns its parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes, Option<Arc<Problem>>, Validators) {
        (
            self.status,
            self.headers,
            self.body,
            self.problem,
            self.validators,
        )
    }

    /// Returns the estimated memory usage of this entry in bytes.
    ///
    /// This includes:
    /// - Fixed struct overhead
    /// - Header names and values
    /// - Body bytes
    /// - Validator strings
    pub fn memory_size(&self) -> usize {
        let fixed_overhead = size_of::<Self>();
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        let problem = self.problem.as_ref().map_or(0, |_| size_of::<Problem>());

        fixed_overhead + headers + self.body.len() + problem + self.validators.heap_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_new_extracts_validators() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"v1\""));
        let entry = CachedResponse::new(StatusCode::OK, headers, Bytes::from_static(b"{}"));
        assert!(entry.revalidate());
        assert_eq!(entry.validators().etag(), Some("\"v1\""));
        assert!(!entry.cache_hit());
    }

    #[test]
    fn test_as_hit_shares_body() {
        let entry = CachedResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from(vec![7u8; 64]));
        let hit = entry.as_hit();
        assert!(hit.cache_hit());
        assert!(!entry.cache_hit());
        assert_eq!(hit.body().as_ptr(), entry.body().as_ptr());
    }

    #[test]
    fn test_memory_size_grows_with_body_and_headers() {
        let small = CachedResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from(vec![0u8; 10]));
        let mut headers = HeaderMap::new();
        headers.insert("x-custom", HeaderValue::from_static("value"));
        let large = CachedResponse::new(StatusCode::OK, headers, Bytes::from(vec![0u8; 110]));
        assert_eq!(large.memory_size() - small.memory_size(), 100 + "x-custom".len() + "value".len());
    }
}
