use super::Error;

/// A readable cache entry failed its type, signature, or TTL check.
///
/// Callers treat this as a cache miss; the offending entry is deleted.
#[derive(Debug)]
pub(super) struct CacheMismatch {
    message: Box<str>,
}

impl std::error::Error for CacheMismatch {}

impl core::fmt::Display for CacheMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "cache mismatch: {}", self.message)
    }
}

impl Error {
    /// Creates a cache mismatch error.
    pub fn cache_mismatch(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::CacheMismatch(CacheMismatch {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a cache mismatch.
    pub fn is_cache_mismatch(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::CacheMismatch(_)))
    }
}
