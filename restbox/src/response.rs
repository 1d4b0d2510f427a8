//! The result of a dispatch.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use restbox_core::{CachedResponse, MediaType, Problem, Validators};
use serde::de::DeserializeOwned;

use crate::error::{DeserializeError, TransportError};

/// Outcome of one dispatch.
///
/// Exactly one of [`status`](Self::status) and [`error`](Self::error) is set.
/// A 4xx or 5xx status is a normal response, not an error.
#[derive(Debug, Clone)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
    problem: Option<Arc<Problem>>,
    validators: Validators,
    cache_hit: bool,
    error: Option<Arc<TransportError>>,
    fallback: MediaType,
}

impl Response {
    pub(crate) fn from_cached(cached: CachedResponse, fallback: MediaType) -> Self {
        let cache_hit = cached.cache_hit();
        let (status, headers, body, problem, validators) = cached.into_parts();
        Response {
            status: Some(status),
            headers,
            body,
            problem,
            validators,
            cache_hit,
            error: None,
            fallback,
        }
    }

    pub(crate) fn from_error(error: TransportError, fallback: MediaType) -> Self {
        Response {
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            problem: None,
            validators: Validators::default(),
            cache_hit: false,
            error: Some(Arc::new(error)),
            fallback,
        }
    }

    /// Status code, absent on transport failure.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Numeric status, `0` on transport failure.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |status| status.as_u16())
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parsed RFC 7807 payload, when the content type announced one.
    pub fn problem(&self) -> Option<&Problem> {
        self.problem.as_deref()
    }

    /// `ETag` header, verbatim.
    pub fn etag(&self) -> Option<&str> {
        self.validators.etag()
    }

    /// Parsed `Last-Modified`.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.validators.last_modified()
    }

    /// Absolute expiry derived from `Cache-Control` or `Expires`.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.validators.expires()
    }

    /// True for a 2xx status.
    pub fn is_ok(&self) -> bool {
        self.status.is_some_and(|status| status.is_success())
    }

    /// True when the body came from the cache, including after a 304.
    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Transport failure, if the dispatch did not complete.
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_deref()
    }

    /// Decodes the body with the codec matching its `Content-Type`.
    ///
    /// Without a `Content-Type` the client's media type is used.
    pub fn deserialize<T>(&self) -> Result<T, DeserializeError>
    where
        T: DeserializeOwned,
    {
        if self.error.is_some() {
            return Err(DeserializeError::TransportFailed);
        }
        let media_type = match self.headers.get(CONTENT_TYPE) {
            None => self.fallback,
            Some(value) => {
                let content_type = value.to_str().unwrap_or_default();
                MediaType::from_content_type(content_type).ok_or_else(|| {
                    DeserializeError::UnknownContentType(content_type.to_owned())
                })?
            }
        };
        Ok(media_type.unmarshal(&self.body)?)
    }

    /// Decodes the body into an existing value.
    pub fn fill_into<T>(&self, target: &mut T) -> Result<(), DeserializeError>
    where
        T: DeserializeOwned,
    {
        *target = self.deserialize()?;
        Ok(())
    }
}

/// Decodes an optional response into `target`. An absent response is an
/// error, never a panic.
pub fn fill_up<T>(response: Option<&Response>, target: &mut T) -> Result<(), DeserializeError>
where
    T: DeserializeOwned,
{
    response
        .ok_or(DeserializeError::NoResponse)?
        .fill_into(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    fn response(status: u16, content_type: Option<&'static str>, body: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        let cached = CachedResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Bytes::from_static(body.as_bytes()),
        );
        Response::from_cached(cached, MediaType::Json)
    }

    #[test]
    fn test_deserialize_by_content_type() {
        let json = response(200, Some("application/json; charset=utf-8"), r#"{"id":1,"name":"Alice"}"#);
        assert_eq!(
            json.deserialize::<User>().unwrap(),
            User { id: 1, name: "Alice".into() }
        );

        let form = response(200, Some("application/x-www-form-urlencoded"), "id=2&name=Bob");
        assert_eq!(form.deserialize::<User>().unwrap().name, "Bob");
    }

    #[test]
    fn test_missing_content_type_uses_fallback() {
        let plain = response(200, None, r#"{"id":3,"name":"Eve"}"#);
        assert_eq!(plain.deserialize::<User>().unwrap().id, 3);
    }

    #[test]
    fn test_unknown_content_type() {
        let html = response(200, Some("text/html"), "<p>hi</p>");
        assert!(matches!(
            html.deserialize::<User>(),
            Err(DeserializeError::UnknownContentType(ct)) if ct == "text/html"
        ));
    }

    #[test]
    fn test_fill_up_without_response() {
        let mut user = User::default();
        assert!(matches!(
            fill_up(None, &mut user),
            Err(DeserializeError::NoResponse)
        ));
    }

    #[test]
    fn test_fill_into_replaces_target() {
        let mut user = User::default();
        fill_up(
            Some(&response(200, Some("application/json"), r#"{"id":9,"name":"Zed"}"#)),
            &mut user,
        )
        .unwrap();
        assert_eq!(user.id, 9);
    }

    #[test]
    fn test_error_response_has_no_status() {
        let failed = Response::from_error(TransportError::ConnectTimeout, MediaType::Json);
        assert_eq!(failed.status(), None);
        assert_eq!(failed.status_code(), 0);
        assert!(!failed.is_ok());
        assert!(matches!(
            failed.deserialize::<User>(),
            Err(DeserializeError::TransportFailed)
        ));
    }

    #[test]
    fn test_is_ok_range() {
        assert!(response(204, None, "").is_ok());
        assert!(!response(304, None, "").is_ok());
        assert!(!response(404, None, "").is_ok());
    }

    #[test]
    fn test_problem_exposed() {
        let problem = response(
            404,
            Some("application/problem+json"),
            r#"{"type":"about:blank","title":"Not Found","status":404}"#,
        );
        assert!(!problem.is_ok());
        assert_eq!(problem.problem().unwrap().status, Some(404));
    }
}
