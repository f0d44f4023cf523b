mod adhoc;
mod cache_mismatch;
mod cancelled;
mod configuration;
mod constraint;
mod driver;
mod missing_identity;
mod rollback_failed;
mod type_conversion;
mod unmatched_columns;
mod unsupported;
mod validation;

use adhoc::AdhocError;
use cache_mismatch::CacheMismatch;
use cancelled::Cancelled;
use configuration::ConfigurationError;
use constraint::{ConstraintViolation, DuplicateKey};
use driver::DriverError;
use missing_identity::MissingIdentity;
use rollback_failed::RollbackFailed;
use std::sync::Arc;
use type_conversion::TypeConversionError;
use unmatched_columns::UnmatchedColumns;
use unsupported::Unsupported;
use validation::ValidationError;

pub use constraint::{is_constraint_violation, is_duplicate_key};
pub use validation::Violation;

/// An error that can occur in sqlkit.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context is shown first,
    /// followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let kind = match consequent.inner {
            Some(inner) => match Arc::try_unwrap(inner) {
                Ok(inner) => inner.kind,
                // Shared context errors are re-rendered as ad-hoc messages so
                // the chain can own its links.
                Err(shared) => ErrorKind::Adhoc(AdhocError::new(shared.kind.to_string())),
            },
            None => ErrorKind::Unknown,
        };

        Error {
            inner: Some(Arc::new(ErrorInner {
                kind,
                cause: Some(self),
            })),
        }
    }

    /// Returns the innermost error of the context chain.
    pub fn root_cause(&self) -> &Error {
        let mut last = self;
        for err in self.chain() {
            last = err;
        }
        last
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }

    /// Returns `true` if any error in the context chain matches `f`.
    fn any_kind(&self, f: impl Fn(&ErrorKind) -> bool) -> bool {
        self.chain().any(|err| f(err.kind()))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Driver(err) => Some(err),
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => self
                .inner
                .as_ref()
                .and_then(|inner| inner.cause.as_ref())
                .map(|cause| cause as &(dyn std::error::Error + 'static)),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    CacheMismatch(CacheMismatch),
    Cancelled(Cancelled),
    Configuration(ConfigurationError),
    ConstraintViolation(ConstraintViolation),
    Driver(DriverError),
    DuplicateKey(DuplicateKey),
    MissingIdentity(MissingIdentity),
    RollbackFailed(RollbackFailed),
    TypeConversion(TypeConversionError),
    UnmatchedColumns(UnmatchedColumns),
    Unsupported(Unsupported),
    Validation(ValidationError),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            CacheMismatch(err) => core::fmt::Display::fmt(err, f),
            Cancelled(err) => core::fmt::Display::fmt(err, f),
            Configuration(err) => core::fmt::Display::fmt(err, f),
            ConstraintViolation(err) => core::fmt::Display::fmt(err, f),
            Driver(err) => core::fmt::Display::fmt(err, f),
            DuplicateKey(err) => core::fmt::Display::fmt(err, f),
            MissingIdentity(err) => core::fmt::Display::fmt(err, f),
            RollbackFailed(err) => core::fmt::Display::fmt(err, f),
            TypeConversion(err) => core::fmt::Display::fmt(err, f),
            UnmatchedColumns(err) => core::fmt::Display::fmt(err, f),
            Unsupported(err) => core::fmt::Display::fmt(err, f),
            Validation(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown sqlkit error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        // Ensure Error stays at one word (size of pointer/Arc)
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::from_args(format_args!("root cause"));
        let mid = Error::from_args(format_args!("middle context"));
        let top = Error::from_args(format_args!("top context"));

        let chained = root.context(mid).context(top);
        assert_eq!(
            chained.to_string(),
            "top context: middle context: root cause"
        );
    }

    #[test]
    fn root_cause_is_innermost() {
        let err = Error::missing_identity("foo").context(err!("delete from foo"));
        assert!(err.root_cause().to_string().starts_with("missing identity"));
        assert!(err.is_missing_identity());
    }

    #[test]
    fn kinds_are_visible_through_context() {
        let err = Error::unmatched_columns(vec!["a".into()]).context(err!("mapping rows"));
        assert!(err.is_unmatched_columns());
        assert!(!err.is_configuration());
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
    }

    #[test]
    fn std_error_bridge() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let our_err: Error = io_err.into();
        assert!(our_err.to_string().contains("file not found"));
    }
}
