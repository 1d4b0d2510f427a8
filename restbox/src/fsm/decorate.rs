//! Header decoration for outgoing requests.

use http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, USER_AGENT,
};
use http::{HeaderMap, HeaderValue};
use restbox_core::{MediaType, Validators, format_http_date};

/// Everything that contributes headers to one request.
pub(crate) struct Decoration<'a> {
    pub(crate) carried: Option<&'a Validators>,
    pub(crate) user_agent: &'a HeaderValue,
    pub(crate) basic_auth: Option<&'a HeaderValue>,
    pub(crate) media_type: MediaType,
    pub(crate) has_body: bool,
    pub(crate) gzip: bool,
    pub(crate) defaults: &'a HeaderMap,
    pub(crate) per_call: &'a HeaderMap,
}

/// Applies headers in increasing precedence. Per-call headers are applied
/// last and replace anything set before them.
pub(crate) fn decorate(headers: &mut HeaderMap, decoration: Decoration<'_>) {
    if let Some(validators) = decoration.carried {
        if let Some(etag) = validators
            .etag()
            .and_then(|etag| HeaderValue::from_str(etag).ok())
        {
            headers.insert(IF_NONE_MATCH, etag);
        } else if let Some(since) = validators
            .last_modified()
            .and_then(|at| HeaderValue::from_str(&format_http_date(at)).ok())
        {
            headers.insert(IF_MODIFIED_SINCE, since);
        }
    }

    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(USER_AGENT, decoration.user_agent.clone());
    if let Some(basic) = decoration.basic_auth {
        headers.insert(AUTHORIZATION, basic.clone());
    }

    headers.insert(
        ACCEPT,
        HeaderValue::from_static(decoration.media_type.accept()),
    );
    if decoration.has_body {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(decoration.media_type.content_type()),
        );
    }
    if decoration.gzip {
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    }

    for (name, value) in decoration.defaults {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    let mut last = None;
    for (name, value) in decoration.per_call {
        // Replace on the first value of each name, append the rest.
        if last.as_ref() != Some(name) {
            headers.insert(name.clone(), value.clone());
            last = Some(name.clone());
        } else {
            headers.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        user_agent: HeaderValue,
        defaults: HeaderMap,
        per_call: HeaderMap,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                user_agent: HeaderValue::from_static("test/restbox"),
                defaults: HeaderMap::new(),
                per_call: HeaderMap::new(),
            }
        }

        fn decoration<'a>(&'a self, carried: Option<&'a Validators>) -> Decoration<'a> {
            Decoration {
                carried,
                user_agent: &self.user_agent,
                basic_auth: None,
                media_type: MediaType::Json,
                has_body: false,
                gzip: false,
                defaults: &self.defaults,
                per_call: &self.per_call,
            }
        }
    }

    fn validators(pairs: &[(&'static str, &'static str)]) -> Validators {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        Validators::extract(&headers)
    }

    #[test]
    fn test_etag_wins_over_last_modified() {
        let fixture = Fixture::new();
        let carried = validators(&[
            ("etag", "\"1234\""),
            ("last-modified", "Sun, 06 Nov 1994 08:49:37 GMT"),
        ]);
        let mut headers = HeaderMap::new();
        decorate(&mut headers, fixture.decoration(Some(&carried)));
        assert_eq!(headers[IF_NONE_MATCH], "\"1234\"");
        assert!(!headers.contains_key(IF_MODIFIED_SINCE));
    }

    #[test]
    fn test_last_modified_sets_if_modified_since() {
        let fixture = Fixture::new();
        let carried = validators(&[("last-modified", "Sun, 06 Nov 1994 08:49:37 GMT")]);
        let mut headers = HeaderMap::new();
        decorate(&mut headers, fixture.decoration(Some(&carried)));
        let expected = format_http_date(Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
        assert_eq!(headers[IF_MODIFIED_SINCE], expected.as_str());
        assert!(!headers.contains_key(IF_NONE_MATCH));
    }

    #[test]
    fn test_fixed_headers() {
        let fixture = Fixture::new();
        let mut headers = HeaderMap::new();
        decorate(&mut headers, fixture.decoration(None));
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[USER_AGENT], "test/restbox");
        assert_eq!(headers[ACCEPT], "application/json");
        assert!(!headers.contains_key(CONTENT_TYPE));
        assert!(!headers.contains_key(ACCEPT_ENCODING));
    }

    #[test]
    fn test_precedence_defaults_then_per_call() {
        let mut fixture = Fixture::new();
        fixture
            .defaults
            .insert(USER_AGENT, HeaderValue::from_static("ignored"));
        fixture
            .defaults
            .insert("x-tenant", HeaderValue::from_static("acme"));
        fixture
            .per_call
            .insert(ACCEPT, HeaderValue::from_static("text/csv"));
        fixture
            .per_call
            .append("x-trace", HeaderValue::from_static("a"));
        fixture
            .per_call
            .append("x-trace", HeaderValue::from_static("b"));

        let mut headers = HeaderMap::new();
        decorate(&mut headers, fixture.decoration(None));
        assert_eq!(headers[USER_AGENT], "test/restbox");
        assert_eq!(headers["x-tenant"], "acme");
        assert_eq!(headers[ACCEPT], "text/csv");
        assert_eq!(headers.get_all("x-trace").iter().count(), 2);
    }
}
