//! Media codecs keyed by content type.
//!
//! [`MediaType`] is a closed set of body formats. Each variant knows its
//! `Content-Type` / `Accept` header values and how to marshal and unmarshal
//! values through serde:
//!
//! | Variant | Header value                        | Backend            |
//! |---------|-------------------------------------|--------------------|
//! | `Json`  | `application/json`                  | `serde_json`       |
//! | `Xml`   | `application/xml`                   | `quick-xml`        |
//! | `Form`  | `application/x-www-form-urlencoded` | `serde_urlencoded` |
//! | `Bytes` | `application/octet-stream`          | raw bytes          |
//!
//! ```
//! use restbox_core::MediaType;
//!
//! let body = MediaType::Json.marshal(&serde_json::json!({"name": "Maria"})).unwrap();
//! assert_eq!(&body[..], br#"{"name":"Maria"}"#);
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::de::value::{BytesDeserializer, Error as ValueError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while encoding or decoding a body.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),
    /// XML encoding or decoding failed.
    #[error("xml codec: {0}")]
    Xml(String),
    /// Form encoding failed.
    #[error("form codec: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),
    /// Form decoding failed.
    #[error("form codec: {0}")]
    FormDecode(#[from] serde_urlencoded::de::Error),
    /// Raw bytes decoding failed.
    #[error("bytes codec: {0}")]
    Bytes(#[source] ValueError),
    /// The value has no representation in this media type.
    #[error("{media_type} cannot marshal {reason}")]
    Unsupported {
        /// Media type that refused the value.
        media_type: MediaType,
        /// What was wrong with the value.
        reason: &'static str,
    },
}

/// Body format used for request marshaling and response unmarshaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// `application/json`
    #[default]
    Json,
    /// `application/xml`
    Xml,
    /// `application/x-www-form-urlencoded`
    Form,
    /// `application/octet-stream`
    Bytes,
}

impl MediaType {
    /// Value for the `Content-Type` header.
    pub const fn content_type(&self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Xml => "application/xml",
            MediaType::Form => "application/x-www-form-urlencoded",
            MediaType::Bytes => "application/octet-stream",
        }
    }

    /// Value for the `Accept` header.
    pub const fn accept(&self) -> &'static str {
        self.content_type()
    }

    /// Maps a `Content-Type` header value to a codec.
    ///
    /// Parameters are ignored and structured syntax suffixes (`+json`, `+xml`)
    /// resolve to their base format.
    pub fn from_content_type(content_type: &str) -> Option<MediaType> {
        let essence = essence(content_type);
        match essence.as_str() {
            "application/json" | "text/json" => Some(MediaType::Json),
            "application/xml" | "text/xml" => Some(MediaType::Xml),
            "application/x-www-form-urlencoded" => Some(MediaType::Form),
            "application/octet-stream" => Some(MediaType::Bytes),
            other if other.ends_with("+json") => Some(MediaType::Json),
            other if other.ends_with("+xml") => Some(MediaType::Xml),
            _ => None,
        }
    }

    /// Encodes a value as a request body.
    pub fn marshal<T>(&self, value: &T) -> Result<Bytes, CodecError>
    where
        T: Serialize + ?Sized,
    {
        match self {
            MediaType::Json => Ok(Bytes::from(serde_json::to_vec(value)?)),
            MediaType::Xml => quick_xml::se::to_string(value)
                .map(Bytes::from)
                .map_err(|e| CodecError::Xml(e.to_string())),
            MediaType::Form => Ok(Bytes::from(serde_urlencoded::to_string(value)?)),
            MediaType::Bytes => match serde_json::to_value(value)? {
                Value::String(text) => Ok(Bytes::from(text)),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(Bytes::from)
                    .ok_or(CodecError::Unsupported {
                        media_type: *self,
                        reason: "a sequence that is not made of bytes",
                    }),
                _ => Err(CodecError::Unsupported {
                    media_type: *self,
                    reason: "values other than strings or byte sequences",
                }),
            },
        }
    }

    /// Decodes a response body into `T`.
    pub fn unmarshal<T>(&self, body: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        match self {
            MediaType::Json => Ok(serde_json::from_slice(body)?),
            MediaType::Xml => {
                let text = std::str::from_utf8(body).map_err(|e| CodecError::Xml(e.to_string()))?;
                quick_xml::de::from_str(text).map_err(|e| CodecError::Xml(e.to_string()))
            }
            MediaType::Form => Ok(serde_urlencoded::from_bytes(body)?),
            MediaType::Bytes => {
                T::deserialize(BytesDeserializer::<ValueError>::new(body)).map_err(CodecError::Bytes)
            }
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Lowercased media type without parameters.
pub(crate) fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
