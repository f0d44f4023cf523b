use crate::{Error, Result, ScanType};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// A single cell value exchanged with drivers, caches, and records.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    /// Null value
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed 8-bit integer
    I8(i8),

    /// Signed 16-bit integer
    I16(i16),

    /// Signed 32-bit integer
    I32(i32),

    /// Signed 64-bit integer
    I64(i64),

    /// Unsigned 8-bit integer
    U8(u8),

    /// Unsigned 16-bit integer
    U16(u16),

    /// Unsigned 32-bit integer
    U32(u32),

    /// Unsigned 64-bit integer
    U64(u64),

    /// 32-bit float
    F32(f32),

    /// 64-bit float
    F64(f64),

    /// String value
    String(String),

    /// Byte sequence
    Bytes(Vec<u8>),

    /// Point in time, normalised to UTC
    Timestamp(DateTime<Utc>),

    /// Calendar date
    Date(NaiveDate),

    /// UUID
    Uuid(uuid::Uuid),

    /// Arbitrary JSON document
    Json(serde_json::Value),
}

impl Value {
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::I8(_) => "I8",
            Self::I16(_) => "I16",
            Self::I32(_) => "I32",
            Self::I64(_) => "I64",
            Self::U8(_) => "U8",
            Self::U16(_) => "U16",
            Self::U32(_) => "U32",
            Self::U64(_) => "U64",
            Self::F32(_) => "F32",
            Self::F64(_) => "F64",
            Self::String(_) => "String",
            Self::Bytes(_) => "Bytes",
            Self::Timestamp(_) => "Timestamp",
            Self::Date(_) => "Date",
            Self::Uuid(_) => "Uuid",
            Self::Json(_) => "Json",
        }
    }

    /// The scan type naturally produced by this value.
    pub fn scan_type(&self) -> ScanType {
        match self {
            Self::Null => ScanType::Any,
            Self::Bool(_) => ScanType::Bool,
            Self::I8(_) => ScanType::I8,
            Self::I16(_) => ScanType::I16,
            Self::I32(_) => ScanType::I32,
            Self::I64(_) => ScanType::I64,
            Self::U8(_) => ScanType::U8,
            Self::U16(_) => ScanType::U16,
            Self::U32(_) => ScanType::U32,
            Self::U64(_) => ScanType::U64,
            Self::F32(_) => ScanType::F32,
            Self::F64(_) => ScanType::F64,
            Self::String(_) => ScanType::String,
            Self::Bytes(_) => ScanType::Bytes,
            Self::Timestamp(_) => ScanType::Timestamp,
            Self::Date(_) => ScanType::Date,
            Self::Uuid(_) => ScanType::Uuid,
            Self::Json(_) => ScanType::Json,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as an `i64` when it is any integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I8(v) => Some(v as i64),
            Self::I16(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::U8(v) => Some(v as i64),
            Self::U16(v) => Some(v as i64),
            Self::U32(v) => Some(v as i64),
            Self::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as an `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Returns `true` for the zero value of the variant: `0`, `""`, `false`,
    /// empty bytes, or null.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(v) => !v,
            Self::String(v) => v.is_empty(),
            Self::Bytes(v) => v.is_empty(),
            Self::F32(v) => *v == 0.0,
            Self::F64(v) => *v == 0.0,
            Self::Uuid(v) => v.is_nil(),
            Self::Timestamp(v) => v.timestamp() == 0 && v.timestamp_subsec_nanos() == 0,
            Self::Date(_) | Self::Json(_) => false,
            _ => self.as_i64() == Some(0),
        }
    }

    /// Renders the value as plain text, the way it would appear in a
    /// delimited file. Null renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::I8(v) => v.to_string(),
            Self::I16(v) => v.to_string(),
            Self::I32(v) => v.to_string(),
            Self::I64(v) => v.to_string(),
            Self::U8(v) => v.to_string(),
            Self::U16(v) => v.to_string(),
            Self::U32(v) => v.to_string(),
            Self::U64(v) => v.to_string(),
            Self::F32(v) => v.to_string(),
            Self::F64(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
            Self::Timestamp(v) => v.to_rfc3339(),
            Self::Date(v) => v.format("%Y-%m-%d").to_string(),
            Self::Uuid(v) => v.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Encodes the value as JSON for cache storage.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Self::Null => Json::Null,
            Self::Bool(v) => Json::Bool(*v),
            Self::F32(v) => serde_json::Number::from_f64(*v as f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::F64(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::U64(v) => Json::from(*v),
            Self::Bytes(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
            Self::Json(v) => v.clone(),
            Self::String(v) => Json::String(v.clone()),
            other => match other.as_i64() {
                Some(v) => Json::from(v),
                None => Json::String(other.to_text()),
            },
        }
    }

    /// Decodes a JSON cell stored by [`Value::to_json`], guided by the scan
    /// type recorded in the cache entry.
    pub fn from_json(json: &serde_json::Value, ty: &ScanType) -> Result<Value> {
        use serde_json::Value as Json;

        if json.is_null() {
            return Ok(Value::Null);
        }

        let value = match ty {
            ScanType::Nullable(inner) => return Value::from_json(json, inner),
            ScanType::Any => match json {
                Json::Bool(v) => Value::Bool(*v),
                Json::Number(n) => match n.as_i64() {
                    Some(v) => Value::I64(v),
                    None => Value::F64(n.as_f64().unwrap_or_default()),
                },
                Json::String(v) => Value::String(v.clone()),
                other => Value::Json(other.clone()),
            },
            ScanType::Json => Value::Json(json.clone()),
            ScanType::Bytes => match json {
                Json::Array(items) => Value::Bytes(
                    items
                        .iter()
                        .map(|b| b.as_u64().map(|b| b as u8))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| err!("invalid byte array in cache row"))?,
                ),
                Json::String(v) => Value::Bytes(v.as_bytes().to_vec()),
                _ => return Err(Error::type_conversion(Value::Json(json.clone()), "bytes")),
            },
            ScanType::String => match json {
                Json::String(v) => Value::String(v.clone()),
                other => Value::String(other.to_string()),
            },
            ScanType::Bool => Value::Bool(
                json.as_bool()
                    .ok_or_else(|| Error::type_conversion(Value::Json(json.clone()), "bool"))?,
            ),
            ScanType::F32 | ScanType::F64 => {
                let v = json
                    .as_f64()
                    .ok_or_else(|| Error::type_conversion(Value::Json(json.clone()), "f64"))?;
                Value::F64(v).convert(ty)?
            }
            ScanType::U64 => Value::U64(
                json.as_u64()
                    .ok_or_else(|| Error::type_conversion(Value::Json(json.clone()), "u64"))?,
            ),
            ScanType::I8
            | ScanType::I16
            | ScanType::I32
            | ScanType::I64
            | ScanType::U8
            | ScanType::U16
            | ScanType::U32 => {
                let v = json
                    .as_i64()
                    .ok_or_else(|| Error::type_conversion(Value::Json(json.clone()), "i64"))?;
                Value::I64(v).convert(ty)?
            }
            ScanType::Timestamp | ScanType::Date | ScanType::Uuid => match json {
                Json::String(v) => Value::String(v.clone()).convert(ty)?,
                _ => return Err(Error::type_conversion(Value::Json(json.clone()), ty.name())),
            },
        };

        Ok(value)
    }

    /// Converts the value into the representation preferred by `ty`.
    ///
    /// Integers are range checked, strings are parsed into temporal and
    /// UUID types, and numbers widen to floats. Null converts to null.
    pub fn convert(self, ty: &ScanType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        macro_rules! int {
            ($variant:ident, $t:ty, $name:literal) => {{
                let v = match &self {
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    Value::Bool(b) => Some(*b as i64),
                    Value::F32(f) if f.fract() == 0.0 => Some(*f as i64),
                    Value::F64(f) if f.fract() == 0.0 => Some(*f as i64),
                    other => other.as_i64(),
                };
                match v.and_then(|v| <$t>::try_from(v).ok()) {
                    Some(v) => Value::$variant(v),
                    None => return Err(Error::type_conversion(self, $name)),
                }
            }};
        }

        let value = match ty {
            ScanType::Nullable(inner) => return self.convert(inner),
            ScanType::Bool => match &self {
                Value::Bool(_) => self,
                Value::String(s) => match s.to_lowercase().as_str() {
                    "true" | "t" | "1" | "y" | "yes" => Value::Bool(true),
                    "false" | "f" | "0" | "n" | "no" => Value::Bool(false),
                    _ => return Err(Error::type_conversion(self, "bool")),
                },
                other => match other.as_i64() {
                    Some(v) => Value::Bool(v != 0),
                    None => return Err(Error::type_conversion(self, "bool")),
                },
            },
            ScanType::I8 => int!(I8, i8, "i8"),
            ScanType::I16 => int!(I16, i16, "i16"),
            ScanType::I32 => int!(I32, i32, "i32"),
            ScanType::I64 => int!(I64, i64, "i64"),
            ScanType::U8 => int!(U8, u8, "u8"),
            ScanType::U16 => int!(U16, u16, "u16"),
            ScanType::U32 => int!(U32, u32, "u32"),
            ScanType::U64 => match &self {
                Value::U64(_) => self,
                Value::String(s) => match s.trim().parse::<u64>() {
                    Ok(v) => Value::U64(v),
                    Err(_) => return Err(Error::type_conversion(self, "u64")),
                },
                other => match other.as_i64().and_then(|v| u64::try_from(v).ok()) {
                    Some(v) => Value::U64(v),
                    None => return Err(Error::type_conversion(self, "u64")),
                },
            },
            ScanType::F32 | ScanType::F64 => {
                let v = match &self {
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                };
                match (v, ty) {
                    (Some(v), ScanType::F32) => Value::F32(v as f32),
                    (Some(v), _) => Value::F64(v),
                    (None, _) => return Err(Error::type_conversion(self, "f64")),
                }
            }
            ScanType::String => match self {
                Value::String(_) => self,
                Value::Bytes(v) => match String::from_utf8(v) {
                    Ok(s) => Value::String(s),
                    Err(e) => return Err(Error::type_conversion(Value::Bytes(e.into_bytes()), "string")),
                },
                other => Value::String(other.to_text()),
            },
            ScanType::Bytes => match self {
                Value::Bytes(_) => self,
                Value::String(s) => Value::Bytes(s.into_bytes()),
                other => return Err(Error::type_conversion(other, "bytes")),
            },
            ScanType::Timestamp => match &self {
                Value::Timestamp(_) => self,
                Value::Date(d) => Value::Timestamp(d.and_time(chrono::NaiveTime::MIN).and_utc()),
                Value::String(s) => match parse_timestamp(s) {
                    Some(v) => Value::Timestamp(v),
                    None => return Err(Error::type_conversion(self, "timestamp")),
                },
                other => match other.as_i64().and_then(|v| DateTime::from_timestamp(v, 0)) {
                    Some(v) => Value::Timestamp(v),
                    None => return Err(Error::type_conversion(self, "timestamp")),
                },
            },
            ScanType::Date => match &self {
                Value::Date(_) => self,
                Value::Timestamp(ts) => Value::Date(ts.date_naive()),
                Value::String(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .ok()
                    .or_else(|| parse_timestamp(s).map(|ts| ts.date_naive()))
                {
                    Some(v) => Value::Date(v),
                    None => return Err(Error::type_conversion(self, "date")),
                },
                _ => return Err(Error::type_conversion(self, "date")),
            },
            ScanType::Uuid => match &self {
                Value::Uuid(_) => self,
                Value::String(s) => match s.trim().parse::<uuid::Uuid>() {
                    Ok(v) => Value::Uuid(v),
                    Err(_) => return Err(Error::type_conversion(self, "uuid")),
                },
                Value::Bytes(b) => match uuid::Uuid::from_slice(b) {
                    Ok(v) => Value::Uuid(v),
                    Err(_) => return Err(Error::type_conversion(self, "uuid")),
                },
                _ => return Err(Error::type_conversion(self, "uuid")),
            },
            ScanType::Json => match self {
                Value::Json(_) => self,
                Value::String(s) => match serde_json::from_str(&s) {
                    Ok(v) => Value::Json(v),
                    Err(_) => Value::Json(serde_json::Value::String(s)),
                },
                Value::Bytes(b) => match serde_json::from_slice(&b) {
                    Ok(v) => Value::Json(v),
                    Err(_) => return Err(Error::type_conversion(Value::Bytes(b), "json")),
                },
                other => Value::Json(other.to_json()),
            },
            ScanType::Any => self,
        };

        Ok(value)
    }
}

/// Parses the timestamp layouts commonly produced by SQL drivers.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(v) = DateTime::parse_from_rfc3339(s) {
        return Some(v.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(v) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(v.and_utc());
        }
    }
    if let Ok(v) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(v.with_timezone(&Utc));
    }
    None
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

macro_rules! impl_from {
    ( $( $t:ty => $variant:ident ),+ $(,)? ) => {
        $(
            impl From<$t> for Value {
                fn from(src: $t) -> Value {
                    Value::$variant(src)
                }
            }
        )+
    };
}

impl_from!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    uuid::Uuid => Uuid,
    serde_json::Value => Json,
);

impl From<&str> for Value {
    fn from(src: &str) -> Value {
        Value::String(src.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(src: Option<T>) -> Value {
        match src {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_narrows_integers() {
        assert_eq!(Value::I64(7).convert(&ScanType::I32).unwrap(), Value::I32(7));
        assert!(Value::I64(300).convert(&ScanType::U8).is_err());
    }

    #[test]
    fn convert_parses_strings() {
        assert_eq!(
            Value::from("42").convert(&ScanType::I64).unwrap(),
            Value::I64(42)
        );
        assert_eq!(
            Value::from("2024-03-01").convert(&ScanType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        let ts = Value::from("2024-03-01 10:11:12")
            .convert(&ScanType::Timestamp)
            .unwrap();
        assert_eq!(ts.to_text(), "2024-03-01T10:11:12+00:00");
    }

    #[test]
    fn null_converts_to_null() {
        assert_eq!(Value::Null.convert(&ScanType::I64).unwrap(), Value::Null);
    }

    #[test]
    fn json_round_trip_by_scan_type() {
        let value = Value::I32(12);
        let decoded = Value::from_json(&value.to_json(), &ScanType::I32).unwrap();
        assert_eq!(decoded, value);

        let value = Value::Bytes(vec![1, 2, 3]);
        let decoded = Value::from_json(&value.to_json(), &ScanType::Bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn zero_values() {
        assert!(Value::I32(0).is_zero());
        assert!(Value::from("").is_zero());
        assert!(!Value::from("x").is_zero());
        assert!(Value::Null.is_zero());
    }
}
