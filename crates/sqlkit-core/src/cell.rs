use crate::{Error, Result, ScanType, Value};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// A record field that values can be scanned into and read from.
///
/// Every leaf field of a [`Record`](crate::Record) implements `Cell`. Scanning
/// converts the driver value into the cell's preferred representation; NULL
/// resets a non-optional cell to its default.
pub trait Cell: Send + Sync {
    /// Scan type declared by the Rust type of the cell.
    fn declared_type() -> ScanType
    where
        Self: Sized;

    /// Reads the cell as a [`Value`].
    fn to_value(&self) -> Value;

    /// Writes `value` into the cell.
    fn set_value(&mut self, value: Value) -> Result<()>;

    /// Returns `true` when the cell holds its zero value.
    fn is_zero(&self) -> bool {
        self.to_value().is_zero()
    }
}

macro_rules! impl_cell {
    ( $( $t:ty => $variant:ident, $scan:ident; )+ ) => {
        $(
            impl Cell for $t {
                fn declared_type() -> ScanType {
                    ScanType::$scan
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn set_value(&mut self, value: Value) -> Result<()> {
                    match value.convert(&ScanType::$scan)? {
                        Value::$variant(v) => {
                            *self = v;
                            Ok(())
                        }
                        Value::Null => {
                            *self = Default::default();
                            Ok(())
                        }
                        other => Err(Error::type_conversion(other, stringify!($t))),
                    }
                }
            }
        )+
    };
}

impl_cell! {
    bool => Bool, Bool;
    i8 => I8, I8;
    i16 => I16, I16;
    i32 => I32, I32;
    i64 => I64, I64;
    u8 => U8, U8;
    u16 => U16, U16;
    u32 => U32, U32;
    u64 => U64, U64;
    f32 => F32, F32;
    f64 => F64, F64;
    String => String, String;
    Vec<u8> => Bytes, Bytes;
    DateTime<Utc> => Timestamp, Timestamp;
    NaiveDate => Date, Date;
    uuid::Uuid => Uuid, Uuid;
    serde_json::Value => Json, Json;
}

impl Cell for NaiveDateTime {
    fn declared_type() -> ScanType {
        ScanType::Timestamp
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(self.and_utc())
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        match value.convert(&ScanType::Timestamp)? {
            Value::Timestamp(ts) => *self = ts.naive_utc(),
            Value::Null => *self = Default::default(),
            other => return Err(Error::type_conversion(other, "NaiveDateTime")),
        }
        Ok(())
    }
}

/// An opaque cell accepting any value as-is.
impl Cell for Value {
    fn declared_type() -> ScanType {
        ScanType::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = value;
        Ok(())
    }
}

impl<C: Cell + Default> Cell for Option<C> {
    fn declared_type() -> ScanType {
        ScanType::nullable(C::declared_type())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(cell) => cell.to_value(),
            None => Value::Null,
        }
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }

        let mut cell = C::default();
        cell.set_value(value)?;
        *self = Some(cell);
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<C: Cell + Default> Cell for Box<C> {
    fn declared_type() -> ScanType {
        C::declared_type()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        (**self).set_value(value)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_converts() {
        let mut v = 0i32;
        v.set_value(Value::I64(12)).unwrap();
        assert_eq!(v, 12);

        let mut s = String::new();
        s.set_value(Value::I64(12)).unwrap();
        assert_eq!(s, "12");
    }

    #[test]
    fn null_resets_plain_cells() {
        let mut v = 5i64;
        v.set_value(Value::Null).unwrap();
        assert_eq!(v, 0);
    }

    #[test]
    fn option_cells() {
        let mut v: Option<i64> = Some(3);
        v.set_value(Value::Null).unwrap();
        assert_eq!(v, None);
        assert!(v.is_zero());
        v.set_value(Value::I32(4)).unwrap();
        assert_eq!(v, Some(4));
        assert_eq!(<Option<i64>>::declared_type(), ScanType::nullable(ScanType::I64));
    }

    #[test]
    fn out_of_range() {
        let mut v = 0u8;
        assert!(v.set_value(Value::I64(-1)).is_err());
    }
}
