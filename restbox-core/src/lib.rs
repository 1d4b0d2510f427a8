#![warn(missing_docs)]
//! # restbox-core
//!
//! Transport-independent building blocks of the restbox HTTP client.
//!
//! This crate holds the pieces of response caching that do not need a network
//! stack, so that store implementations (like `restbox-moka`) depend on it
//! alone:
//!
//! - [`Validators`] - derive TTL, ETag and Last-Modified from response headers
//! - [`CachedResponse`] - a stored exchange with its validators
//! - [`CacheKey`] - request identity used by stores
//! - [`CacheStore`] - the store contract (`get` / `insert_if_absent`)
//! - [`MediaType`] - body codecs for JSON, XML, form and raw bytes
//! - [`Problem`] - RFC 7807 error payloads

pub mod cached;
pub mod codec;
pub mod date;
pub mod key;
pub mod problem;
pub mod store;
pub mod validators;

pub use cached::CachedResponse;
pub use codec::{CodecError, MediaType};
pub use date::{format_http_date, parse_http_date};
pub use key::CacheKey;
pub use problem::Problem;
pub use store::{Admission, CacheStore};
pub use validators::Validators;

/// Raw body bytes. Cloning shares the underlying buffer.
pub type Raw = bytes::Bytes;
