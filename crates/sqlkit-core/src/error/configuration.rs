use super::Error;

/// Error raised while setting up a session, mapper, or metadata query.
///
/// This covers:
/// - empty column lists
/// - unregistered metadata query kinds
/// - products that cannot be resolved
/// - presence fields that do not match any data field
/// - malformed tags
///
/// These are not recoverable at the session layer.
#[derive(Debug)]
pub(super) struct ConfigurationError {
    message: Box<str>,
}

impl std::error::Error for ConfigurationError {}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Configuration(ConfigurationError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::Configuration(_)))
    }
}
