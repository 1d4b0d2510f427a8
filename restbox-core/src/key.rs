//! Cache key type.
//!
//! A [`CacheKey`] is the fully qualified request URL exactly as the client
//! built it, before any mock endpoint substitution. Two requests share a cache
//! entry iff their keys are byte-identical:
//!
//! ```
//! use restbox_core::CacheKey;
//!
//! let a = CacheKey::new("http://api.example.com/users?a=1&b=2");
//! let b = CacheKey::new("http://api.example.com/users?b=2&a=1");
//! assert_ne!(a, b);
//! ```
//!
//! Query parameters are not reordered and no `Vary` partitioning is applied.

use std::fmt;
use std::mem::size_of;

use smol_str::SmolStr;

/// Inline capacity of [`SmolStr`]; longer strings live on the heap.
const INLINE_CAPACITY: usize = 23;

/// Identity of a cached response.
///
/// Cloning is cheap: URLs longer than 23 bytes are reference counted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from a fully qualified URL.
    pub fn new(url: impl AsRef<str>) -> Self {
        CacheKey(SmolStr::new(url.as_ref()))
    }

    /// Returns the URL this key was built from.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the estimated memory usage of this key in bytes.
    ///
    /// Counts the struct itself plus heap content for URLs that do not fit
    /// inline.
    pub fn memory_size(&self) -> usize {
        let heap = if self.0.len() > INLINE_CAPACITY {
            self.0.len()
        } else {
            0
        };
        size_of::<Self>() + heap
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CacheKey {
    fn from(url: &str) -> Self {
        CacheKey::new(url)
    }
}

impl From<String> for CacheKey {
    fn from(url: String) -> Self {
        CacheKey(SmolStr::from(url))
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_has_no_heap_cost() {
        let key = CacheKey::new("http://a.io/x");
        assert_eq!(key.memory_size(), size_of::<CacheKey>());
    }

    #[test]
    fn test_long_key_counts_heap_bytes() {
        let url = "http://api.example.com/users/42?expand=profile";
        let key = CacheKey::new(url);
        assert_eq!(key.memory_size(), size_of::<CacheKey>() + url.len());
    }

    #[test]
    fn test_trailing_slash_is_a_different_key() {
        assert_ne!(
            CacheKey::new("http://api.example.com/user"),
            CacheKey::new("http://api.example.com/user/")
        );
    }
}
