use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use restbox_core::{CacheKey, CachedResponse, Problem, Validators};
use tracing::{Instrument, debug, debug_span, trace, warn};
use url::Url;

use super::decorate::{Decoration, decorate};
use super::states::{State, Terminal, Transition};
use crate::bound::Bound;
use crate::client::Inner;
use crate::context::CallContext;
use crate::error::{Error, TransportError};
use crate::metrics::{record_admission, record_request};
use crate::mock::ORIGINAL_URL_HEADER;
use crate::response::Response;
use crate::transport::TransportRequest;

/// One logical request attempt.
pub(crate) struct Dispatch {
    pub(crate) inner: Arc<Inner>,
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) context: CallContext,
}

/// Verbs whose responses may be cached.
pub(crate) fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

impl Dispatch {
    /// Runs the pipeline to a terminal state.
    ///
    /// Only configuration problems surface as `Err`. Everything that happens
    /// on the wire ends up in the returned [`Response`].
    pub(crate) async fn run(self) -> Result<Response, Error> {
        let inner = self.inner.clone();
        let bound = inner.bound()?;
        let span = debug_span!(
            "restbox.dispatch",
            client = %inner.config.name,
            method = %self.method,
            url = %self.url,
        );
        Ok(self.drive(bound).instrument(span).await)
    }

    async fn drive(mut self, bound: &Bound) -> Response {
        let started = Instant::now();
        let key = CacheKey::new(self.url.as_str());
        let caching = self.inner.caching() && is_cacheable_method(&self.method);

        let mut state = State::Start;
        let terminal = loop {
            debug!(?state, "dispatch state");
            match self.step(state, bound, &key, caching).await {
                Transition::Next(next) => state = next,
                Transition::Done(terminal) => break terminal,
            }
        };
        debug!(?terminal, "dispatch finished");

        let event = terminal.event();
        let response = self.complete(terminal, key, caching).await;
        let outcome = match response.error() {
            Some(error) => error.class().to_owned(),
            None => response.status_code().to_string(),
        };
        record_request(
            &self.inner.config.name,
            self.method.as_str(),
            event,
            &outcome,
            started.elapsed(),
        );
        response
    }

    async fn step(
        &mut self,
        state: State,
        bound: &Bound,
        key: &CacheKey,
        caching: bool,
    ) -> Transition {
        match state {
            State::Start => match self.context.check() {
                Err(cause) => Terminal::NetworkError {
                    error: TransportError::Cancelled(cause),
                }
                .into(),
                Ok(()) if caching => State::CacheLookup.into(),
                Ok(()) => State::BuildRequest { carried: None }.into(),
            },

            State::CacheLookup => match self.inner.store.get(key).await {
                Some(cached) if !cached.revalidate() => Terminal::CacheHitFresh { cached }.into(),
                Some(cached) => State::BuildRequest {
                    carried: Some(cached),
                }
                .into(),
                None => {
                    trace!(%key, "cache miss");
                    State::BuildRequest { carried: None }.into()
                }
            },

            State::BuildRequest { carried } => {
                let mut request = match self.inner.mock.rewrite(&self.url) {
                    Some(target) => {
                        let mut request = TransportRequest::new(self.method.clone(), target);
                        if let Ok(original) = HeaderValue::from_str(self.url.as_str()) {
                            request.headers.insert(ORIGINAL_URL_HEADER, original);
                        }
                        request
                    }
                    None => TransportRequest::new(self.method.clone(), self.url.clone()),
                };
                request.body = self.body.take();
                State::DecorateHeaders { request, carried }.into()
            }

            State::DecorateHeaders {
                mut request,
                carried,
            } => {
                let config = &self.inner.config;
                decorate(
                    &mut request.headers,
                    Decoration {
                        carried: carried.as_ref().map(CachedResponse::validators),
                        user_agent: &bound.user_agent,
                        basic_auth: bound.basic_auth.as_ref(),
                        media_type: config.media_type,
                        has_body: request.body.is_some(),
                        gzip: config.gzip,
                        defaults: &bound.default_headers,
                        per_call: &self.headers,
                    },
                );
                State::Send { request, carried }.into()
            }

            State::Send { request, carried } => {
                let result = tokio::select! {
                    biased;
                    cause = self.context.done() => Err(TransportError::Cancelled(cause)),
                    result = bound.transport.send(request) => result,
                };
                match result {
                    Ok(response) => State::Receive { response, carried }.into(),
                    Err(error) => Terminal::NetworkError { error }.into(),
                }
            }

            State::Receive { response, carried } => match carried {
                Some(cached) if response.status == StatusCode::NOT_MODIFIED => {
                    Terminal::NotModified { cached }.into()
                }
                _ => State::FreshResponse { response }.into(),
            },

            State::FreshResponse { response } => {
                let problem = Problem::detect(&response.headers, &response.body);
                State::ExtractValidators { response, problem }.into()
            }

            State::ExtractValidators { response, problem } => {
                let validators = Validators::extract(&response.headers);
                let entry = CachedResponse::from_parts(
                    response.status,
                    response.headers,
                    response.body,
                    problem.map(Arc::new),
                    validators,
                );
                Terminal::ConditionalAdmit { entry }.into()
            }
        }
    }

    async fn complete(&self, terminal: Terminal, key: CacheKey, caching: bool) -> Response {
        let fallback = self.inner.config.media_type;
        match terminal {
            Terminal::CacheHitFresh { cached } | Terminal::NotModified { cached } => {
                Response::from_cached(cached, fallback)
            }
            Terminal::NetworkError { error } => {
                warn!(class = error.class(), %error, "dispatch failed");
                Response::from_error(error, fallback)
            }
            Terminal::ConditionalAdmit { entry } => {
                if caching && entry.validators().is_cacheable() {
                    let store = &self.inner.store;
                    let admission = store.insert_if_absent(key.clone(), entry.clone()).await;
                    debug!(%key, store = store.label(), admission = admission.as_str(), "cache admission");
                    record_admission(store.label(), admission);
                }
                Response::from_cached(entry, fallback)
            }
        }
    }
}
