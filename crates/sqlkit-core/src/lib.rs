#[macro_use]
mod macros;

pub mod cell;
pub use cell::Cell;

pub mod column;
pub use column::Column;

pub mod driver;
pub use driver::Connection;

mod error;
pub use error::{is_constraint_violation, is_duplicate_key, Error, IntoError, Violation};

pub mod hash;

pub mod record;
pub use record::{FieldDef, Record};

pub mod scan_type;
pub use scan_type::ScanType;

pub mod tag;
pub use tag::Tag;

pub mod value;
pub use value::Value;

/// A Result type alias that uses sqlkit's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
