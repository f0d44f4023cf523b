mod error;
pub(crate) use error::ErrorSet;

mod field;
pub(crate) use field::{Field, FieldTy, Owner};

mod record;
pub(crate) use record::Record;
