//! Dispatch pipeline state machine.
//!
//! ```text
//! Start -> CacheLookup -> CacheHitFresh                        (terminal)
//!                      \-> BuildRequest -> DecorateHeaders -> Send
//! Send -> NetworkError                                         (terminal)
//!      \-> Receive -> NotModified                              (terminal)
//!                  \-> FreshResponse -> ExtractValidators -> ConditionalAdmit (terminal)
//! ```
//!
//! `CacheLookup` is skipped unless caching is enabled and the verb is GET,
//! HEAD or OPTIONS. A hit that needs revalidation carries its validators into
//! `DecorateHeaders`, and a 304 answer to that request returns the carried
//! entry.

mod decorate;
mod machine;
mod states;

pub(crate) use machine::Dispatch;
