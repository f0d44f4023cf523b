use super::Error;

/// The chosen dialect does not support a requested feature.
#[derive(Debug)]
pub(super) struct Unsupported {
    message: Box<str>,
}

impl std::error::Error for Unsupported {}

impl core::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "unsupported: {}", self.message)
    }
}

impl Error {
    /// Creates an unsupported feature error.
    pub fn unsupported(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Unsupported(Unsupported {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is an unsupported feature error.
    pub fn is_unsupported(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::Unsupported(_)))
    }
}
