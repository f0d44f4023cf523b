use super::Error;

/// Driver messages that indicate a uniqueness violation.
const DUPLICATE_KEY_MARKERS: &[&str] = &[
    "unique constraint",
    "duplicate key",
    "duplicate entry",
];

/// Driver messages that indicate any constraint violation.
const CONSTRAINT_MARKERS: &[&str] = &[
    "unique constraint",
    "duplicate key",
    "duplicate entry",
    "not null constraint",
    "foreign key constraint",
    "check constraint",
    "constraint failed",
    "violates",
];

/// A unique key or primary key violation.
#[derive(Debug)]
pub(super) struct DuplicateKey {
    message: Box<str>,
}

impl std::error::Error for DuplicateKey {}

impl core::fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "duplicate key: {}", self.message)
    }
}

/// Any other constraint violation (not null, foreign key, check).
#[derive(Debug)]
pub(super) struct ConstraintViolation {
    message: Box<str>,
}

impl std::error::Error for ConstraintViolation {}

impl core::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "constraint violation: {}", self.message)
    }
}

/// Returns `true` when a driver message reports a duplicate key.
pub fn is_duplicate_key(message: &str) -> bool {
    let message = message.to_lowercase();
    DUPLICATE_KEY_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Returns `true` when a driver message reports a constraint violation.
pub fn is_constraint_violation(message: &str) -> bool {
    let message = message.to_lowercase();
    CONSTRAINT_MARKERS.iter().any(|marker| message.contains(marker))
}

impl Error {
    /// Creates a duplicate key error.
    pub fn duplicate_key(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::DuplicateKey(DuplicateKey {
            message: message.into().into(),
        }))
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ConstraintViolation(ConstraintViolation {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a duplicate key, either by kind or by
    /// the wording of a wrapped driver message.
    pub fn is_duplicate_key(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::DuplicateKey(_)))
            || is_duplicate_key(&self.to_string())
    }

    /// Returns `true` if this error is any constraint violation, either by
    /// kind or by the wording of a wrapped driver message.
    pub fn is_constraint_violation(&self) -> bool {
        self.any_kind(|kind| {
            matches!(
                kind,
                super::ErrorKind::DuplicateKey(_) | super::ErrorKind::ConstraintViolation(_)
            )
        }) || is_constraint_violation(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_unique_message() {
        assert!(is_duplicate_key(
            "constraint failed: UNIQUE constraint failed: user_oauth_token.user_id, user_oauth_token.provider (1555)"
        ));
    }

    #[test]
    fn mysql_duplicate_entry() {
        assert!(is_duplicate_key("Error 1062: Duplicate entry '1' for key 'PRIMARY'"));
    }

    #[test]
    fn not_null_is_constraint_but_not_duplicate() {
        let msg = "NOT NULL constraint failed: users.name";
        assert!(!is_duplicate_key(msg));
        assert!(is_constraint_violation(msg));
    }

    #[test]
    fn postgres_violates() {
        assert!(is_constraint_violation(
            "insert or update on table \"orders\" violates foreign key constraint"
        ));
    }

    #[test]
    fn kind_detection() {
        let err = Error::duplicate_key("users.email");
        assert!(err.is_duplicate_key());
        assert!(err.is_constraint_violation());

        let err = Error::constraint_violation("check");
        assert!(!err.is_duplicate_key());
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn unrelated_message() {
        assert!(!is_constraint_violation("connection refused"));
    }
}
