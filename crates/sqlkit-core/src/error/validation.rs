use super::Error;

/// A single precondition violation found while validating records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending value, e.g. `[2].Email`
    pub location: String,

    /// Field name
    pub field: String,

    /// Offending value rendered as text
    pub value: String,

    /// Violation reason: `unique`, `refKey`, or `notnull`
    pub check: &'static str,

    /// Message rendered for this violation
    pub message: String,
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Error carrying the complete violation report for a validated data set.
#[derive(Debug)]
pub(super) struct ValidationError {
    violations: Vec<Violation>,
}

impl std::error::Error for ValidationError {}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("validation failed: ")?;
        let mut sep = "";
        for violation in &self.violations {
            write!(f, "{sep}{violation}")?;
            sep = "; ";
        }
        Ok(())
    }
}

impl Error {
    /// Creates an error reporting every violation.
    pub fn validation(violations: Vec<Violation>) -> Error {
        Error::from(super::ErrorKind::Validation(ValidationError { violations }))
    }

    /// Returns `true` if this error is a validation report.
    pub fn is_validation(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::Validation(_)))
    }

    /// Returns the violations when this error is a validation report.
    pub fn violations(&self) -> Option<&[Violation]> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::Validation(err) => Some(&err.violations[..]),
            _ => None,
        })
    }
}
