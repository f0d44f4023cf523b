use super::Error;
use crate::Value;

/// Error when a value cannot be converted to the expected type.
#[derive(Debug)]
pub(super) struct TypeConversionError {
    value: Value,
    to_type: &'static str,
}

impl std::error::Error for TypeConversionError {}

impl core::fmt::Display for TypeConversionError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "cannot convert {} to {}",
            self.value.kind_name(),
            self.to_type
        )
    }
}

impl Error {
    /// Creates a type conversion error.
    pub fn type_conversion(value: Value, to_type: &'static str) -> Error {
        Error::from(super::ErrorKind::TypeConversion(TypeConversionError {
            value,
            to_type,
        }))
    }

    /// Returns `true` if this error is a type conversion error.
    pub fn is_type_conversion(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::TypeConversion(_)))
    }
}
