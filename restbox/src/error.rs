//! Error types.
//!
//! Only [`Error`] is returned from dispatch. Network failures never show up
//! here; they are carried on the [`Response`](crate::Response) as a
//! [`TransportError`].

use std::time::Duration;

use restbox_core::CodecError;
use thiserror::Error;

use crate::context::CancelCause;

/// Errors returned by [`RequestBuilder::send`](crate::RequestBuilder::send)
/// before any network activity.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid client configuration or request parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The request body could not be encoded with the client's media type.
    #[error("failed to marshal request body: {0}")]
    Marshal(#[from] CodecError),
    /// A spawned dispatch panicked or was aborted by runtime shutdown.
    #[error("dispatch task failed: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Configuration problems detected while building a client or a request.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL or request path does not form a valid URL.
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// Header name is not a valid token.
    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),
    /// Header value contains forbidden characters.
    #[error("invalid value for header `{0}`")]
    InvalidHeaderValue(String),
    /// The HTTP stack refused the pool configuration.
    #[error("failed to build http transport: {0}")]
    Transport(#[source] reqwest::Error),
    /// YAML configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

/// Failures of the token endpoint used by OAuth client credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token request could not be sent or read.
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}")]
    Status {
        /// Status code returned by the endpoint.
        status: u16,
    },
    /// The token response body was not understood.
    #[error("malformed token response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Encoding the grant parameters failed.
    #[error("failed to encode token request: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
    /// The token contains characters not allowed in a header.
    #[error("token is not a valid header value")]
    InvalidToken,
}

/// Transport-level failure of a dispatch.
///
/// When a response carries one of these its status is always absent.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No usable connection within the connect timeout.
    #[error("connect timeout")]
    ConnectTimeout,
    /// Response headers did not arrive within the request timeout.
    #[error("no response headers within {0:?}")]
    HeaderTimeout(Duration),
    /// A redirect was refused by policy or the redirect limit was hit.
    #[error("redirect refused: {0}")]
    Redirect(String),
    /// The call context was cancelled or its deadline passed.
    #[error("request cancelled: {0}")]
    Cancelled(CancelCause),
    /// Bearer token could not be obtained.
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),
    /// DNS, connect, TLS, proxy or body read failure.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl TransportError {
    /// Error class used for metrics labels.
    pub fn class(&self) -> &'static str {
        match self {
            TransportError::ConnectTimeout => "connect_timeout",
            TransportError::HeaderTimeout(_) => "header_timeout",
            TransportError::Redirect(_) => "redirect",
            TransportError::Cancelled(CancelCause::Cancelled) => "cancelled",
            TransportError::Cancelled(CancelCause::DeadlineExceeded) => "deadline",
            TransportError::Auth(_) => "auth",
            TransportError::Network(_) => "network",
        }
    }

    /// True for both timeout classes.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectTimeout | TransportError::HeaderTimeout(_)
        )
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_redirect() {
            let reason = std::error::Error::source(&error)
                .map(ToString::to_string)
                .unwrap_or_else(|| error.to_string());
            TransportError::Redirect(reason)
        } else if error.is_connect() && error.is_timeout() {
            TransportError::ConnectTimeout
        } else {
            TransportError::Network(error)
        }
    }
}

/// Errors from explicit body deserialization.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// There is no response to read from.
    #[error("no response to deserialize")]
    NoResponse,
    /// The dispatch ended in a transport failure, so there is no body.
    #[error("request failed before a response was received")]
    TransportFailed,
    /// Content-Type does not map to a known codec.
    #[error("no codec for content type `{0}`")]
    UnknownContentType(String),
    /// The codec rejected the body.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(TransportError::ConnectTimeout.class(), "connect_timeout");
        assert_eq!(
            TransportError::HeaderTimeout(Duration::from_millis(5)).class(),
            "header_timeout"
        );
        assert_eq!(
            TransportError::Cancelled(CancelCause::DeadlineExceeded).class(),
            "deadline"
        );
        assert!(TransportError::HeaderTimeout(Duration::ZERO).is_timeout());
        assert!(!TransportError::Redirect("refused".into()).is_timeout());
    }
}
