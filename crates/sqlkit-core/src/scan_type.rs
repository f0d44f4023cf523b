use crate::{Error, Result};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// The in-memory representation preferred for a cell.
///
/// Drivers report it for result-set columns, record fields declare it through
/// their [`Cell`](crate::Cell) type, and cache entries persist it so rows can
/// be decoded without consulting the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Timestamp,
    Date,
    Uuid,
    Json,

    /// A cell that may be NULL
    Nullable(Box<ScanType>),

    /// Unknown or opaque representation
    Any,
}

impl ScanType {
    pub fn nullable(ty: ScanType) -> ScanType {
        match ty {
            ScanType::Nullable(_) | ScanType::Any => ty,
            ty => ScanType::Nullable(Box::new(ty)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ScanType::Nullable(_) | ScanType::Any)
    }

    /// Strips the nullable wrapper.
    pub fn base(&self) -> &ScanType {
        match self {
            ScanType::Nullable(inner) => inner.base(),
            ty => ty,
        }
    }

    /// Returns `true` when values of `other` can be stored in a cell of this
    /// type without conversion. Nullability is ignored.
    pub fn matches(&self, other: &ScanType) -> bool {
        match (self.base(), other.base()) {
            (ScanType::Any, _) | (_, ScanType::Any) => true,
            (a, b) => a == b,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScanType::Bool => "bool",
            ScanType::I8 => "i8",
            ScanType::I16 => "i16",
            ScanType::I32 => "i32",
            ScanType::I64 => "i64",
            ScanType::U8 => "u8",
            ScanType::U16 => "u16",
            ScanType::U32 => "u32",
            ScanType::U64 => "u64",
            ScanType::F32 => "f32",
            ScanType::F64 => "f64",
            ScanType::String => "string",
            ScanType::Bytes => "bytes",
            ScanType::Timestamp => "timestamp",
            ScanType::Date => "date",
            ScanType::Uuid => "uuid",
            ScanType::Json => "json",
            ScanType::Nullable(inner) => inner.name(),
            ScanType::Any => "any",
        }
    }

    /// Derives a scan type from a database type name using keyword matching.
    ///
    /// `char`, `text` and `string` map to strings, `int` to 64-bit integers,
    /// `numeric`, `decimal`, `float`, `double` and `real` to 64-bit floats,
    /// `time` and `date` to timestamps, `bool` to booleans, and `bytes` and
    /// `blob` to byte sequences. Anything else is opaque.
    pub fn from_database_type(name: &str) -> ScanType {
        let name = name.to_lowercase();
        let has = |keyword: &str| name.contains(keyword);

        if has("char") || has("text") || has("string") || has("clob") {
            ScanType::String
        } else if has("bool") {
            ScanType::Bool
        } else if has("int") {
            ScanType::I64
        } else if has("numeric")
            || has("decimal")
            || has("float")
            || has("double")
            || has("real")
            || has("number")
        {
            ScanType::F64
        } else if has("time") || has("date") {
            ScanType::Timestamp
        } else if has("bytes") || has("blob") || has("binary") || has("bytea") {
            ScanType::Bytes
        } else if has("uuid") {
            ScanType::Uuid
        } else if has("json") {
            ScanType::Json
        } else {
            ScanType::Any
        }
    }
}

impl core::fmt::Display for ScanType {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            ScanType::Nullable(inner) => write!(f, "*{inner}"),
            ty => f.write_str(ty.name()),
        }
    }
}

impl FromStr for ScanType {
    type Err = Error;

    fn from_str(s: &str) -> Result<ScanType> {
        if let Some(inner) = s.strip_prefix('*') {
            return Ok(ScanType::nullable(inner.parse()?));
        }

        Ok(match s {
            "bool" => ScanType::Bool,
            "i8" => ScanType::I8,
            "i16" => ScanType::I16,
            "i32" => ScanType::I32,
            "i64" => ScanType::I64,
            "u8" => ScanType::U8,
            "u16" => ScanType::U16,
            "u32" => ScanType::U32,
            "u64" => ScanType::U64,
            "f32" => ScanType::F32,
            "f64" => ScanType::F64,
            "string" => ScanType::String,
            "bytes" => ScanType::Bytes,
            "timestamp" => ScanType::Timestamp,
            "date" => ScanType::Date,
            "uuid" => ScanType::Uuid,
            "json" => ScanType::Json,
            "any" => ScanType::Any,
            _ => bail!("unknown scan type: {s}"),
        })
    }
}

impl Serialize for ScanType {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScanType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_heuristic() {
        assert_eq!(ScanType::from_database_type("VARCHAR(20)"), ScanType::String);
        assert_eq!(ScanType::from_database_type("BIGINT"), ScanType::I64);
        assert_eq!(ScanType::from_database_type("DECIMAL(7,2)"), ScanType::F64);
        assert_eq!(ScanType::from_database_type("TIMESTAMP"), ScanType::Timestamp);
        assert_eq!(ScanType::from_database_type("BLOB"), ScanType::Bytes);
        assert_eq!(ScanType::from_database_type("BOOLEAN"), ScanType::Bool);
        assert_eq!(ScanType::from_database_type("GEOMETRY"), ScanType::Any);
    }

    #[test]
    fn display_parse() {
        let ty = ScanType::nullable(ScanType::I32);
        assert_eq!(ty.to_string(), "*i32");
        assert_eq!("*i32".parse::<ScanType>().unwrap(), ty);
    }

    #[test]
    fn matching_ignores_nullability() {
        assert!(ScanType::I64.matches(&ScanType::nullable(ScanType::I64)));
        assert!(!ScanType::I64.matches(&ScanType::String));
        assert!(ScanType::Any.matches(&ScanType::String));
    }
}
