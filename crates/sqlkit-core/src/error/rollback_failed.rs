use super::Error;

/// Rolling back a transaction failed while handling another error.
#[derive(Debug)]
pub(super) struct RollbackFailed {
    rollback: Error,
}

impl std::error::Error for RollbackFailed {}

impl core::fmt::Display for RollbackFailed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "rollback failed ({})", self.rollback)
    }
}

impl Error {
    /// Annotates this error with a failed rollback. The receiver stays the
    /// root cause; the rollback failure is layered on top as context.
    pub fn with_rollback_failure(self, rollback: Error) -> Error {
        self.context(Error::from(super::ErrorKind::RollbackFailed(
            RollbackFailed { rollback },
        )))
    }

    /// Returns `true` if a rollback failure was recorded on this error.
    pub fn is_rollback_failed(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::RollbackFailed(_)))
    }
}
