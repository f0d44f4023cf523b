use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use sqlkit_core::Value as CoreValue;

/// Bind parameter wrapper.
#[derive(Debug)]
pub(crate) struct Value<'a>(pub(crate) &'a CoreValue);

impl Value<'_> {
    /// Converts a SQLite cell into a sqlkit value.
    pub(crate) fn from_sql(value: ValueRef<'_>) -> CoreValue {
        match value {
            ValueRef::Null => CoreValue::Null,
            ValueRef::Integer(v) => CoreValue::I64(v),
            ValueRef::Real(v) => CoreValue::F64(v),
            ValueRef::Text(v) => CoreValue::String(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => CoreValue::Bytes(v.to_vec()),
        }
    }
}

impl ToSql for Value<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let owned = |value| Ok(ToSqlOutput::Owned(value));

        match self.0 {
            CoreValue::Null => owned(SqlValue::Null),
            CoreValue::Bool(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::I8(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::I16(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::I32(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::I64(v) => owned(SqlValue::Integer(*v)),
            CoreValue::U8(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::U16(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::U32(v) => owned(SqlValue::Integer(*v as i64)),
            CoreValue::U64(v) => match i64::try_from(*v) {
                Ok(v) => owned(SqlValue::Integer(v)),
                Err(err) => Err(rusqlite::Error::ToSqlConversionFailure(Box::new(err))),
            },
            CoreValue::F32(v) => owned(SqlValue::Real(*v as f64)),
            CoreValue::F64(v) => owned(SqlValue::Real(*v)),
            CoreValue::String(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            CoreValue::Bytes(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(&v[..]))),
            CoreValue::Timestamp(v) => owned(SqlValue::Text(
                v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            other => owned(SqlValue::Text(other.to_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_overflow_is_rejected() {
        let value = CoreValue::U64(u64::MAX);
        assert!(Value(&value).to_sql().is_err());
    }

    #[test]
    fn reads_cells() {
        assert_eq!(Value::from_sql(ValueRef::Integer(3)), CoreValue::I64(3));
        assert_eq!(
            Value::from_sql(ValueRef::Text(b"abc")),
            CoreValue::String("abc".into())
        );
        assert_eq!(Value::from_sql(ValueRef::Null), CoreValue::Null);
    }
}
