//! Text rendering of records for bulk-load bodies.

use crate::field::Fields;

use serde::Deserialize;
use sqlkit_core::{Record, Result, Value};

/// Layout of a delimited body.
///
/// Deserializes from configuration documents with every field optional:
///
/// ```
/// use sqlkit::ReaderConfig;
///
/// let config: ReaderConfig = serde_json::from_str(r#"{"field_separator": "\t"}"#).unwrap();
/// assert_eq!(config.object_separator, "\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub field_separator: String,
    pub object_separator: String,

    /// Wraps every non-null value when not empty
    pub enclose_by: String,

    /// Prefixes characters that would otherwise end a value
    pub escape_by: String,

    /// Text written for NULL
    pub null_value: String,

    pub stringify: StringifyConfig,
}

impl Default for ReaderConfig {
    fn default() -> ReaderConfig {
        ReaderConfig {
            field_separator: ",".to_string(),
            object_separator: "\n".to_string(),
            enclose_by: String::new(),
            escape_by: "\\".to_string(),
            null_value: "\\N".to_string(),
            stringify: StringifyConfig::default(),
        }
    }
}

/// Separators the stringifier leaves unescaped, for data known not to
/// contain them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StringifyConfig {
    pub ignore_field_separator: bool,
    pub ignore_object_separator: bool,
    pub ignore_enclose_by: bool,
}

/// Renders records of type `T` as rows of text.
pub struct Stringifier<T> {
    fields: Fields<T>,
    config: ReaderConfig,

    /// Sequences escaped inside values, longest first
    escaped: Vec<String>,
}

impl<T> core::fmt::Debug for Stringifier<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Stringifier")
            .field("columns", &self.columns())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Record> Stringifier<T> {
    pub fn new(config: ReaderConfig) -> Result<Stringifier<T>> {
        let fields = Fields::<T>::of()?;

        let mut escaped = vec![];
        if !config.escape_by.is_empty() {
            escaped.push(config.escape_by.clone());
            if !config.stringify.ignore_field_separator {
                escaped.push(config.field_separator.clone());
            }
            if !config.stringify.ignore_object_separator {
                escaped.push(config.object_separator.clone());
            }
            if !config.stringify.ignore_enclose_by {
                escaped.push(config.enclose_by.clone());
            }
        }
        escaped.retain(|s| !s.is_empty());
        escaped.sort_by_key(|s| std::cmp::Reverse(s.len()));
        escaped.dedup();

        Ok(Stringifier {
            fields,
            config,
            escaped,
        })
    }
}

impl<T> Stringifier<T> {
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Column of each rendered value, in order.
    pub fn columns(&self) -> Vec<String> {
        self.fields.data.iter().map(|f| f.column_name()).collect()
    }

    /// Values of `record`, each escaped and enclosed.
    pub fn stringify(&self, record: &T) -> Vec<String> {
        self.fields
            .data
            .iter()
            .map(|field| self.render(&field.accessor.value(record)))
            .collect()
    }

    /// `record` as one row, terminated by the object separator.
    pub fn line(&self, record: &T) -> String {
        let mut line = self.stringify(record).join(&self.config.field_separator);
        line.push_str(&self.config.object_separator);
        line
    }

    /// Every record as a delimited body.
    pub fn body(&self, records: &[T]) -> Vec<u8> {
        let mut body = String::new();
        for record in records {
            body.push_str(&self.line(record));
        }
        body.into_bytes()
    }

    fn render(&self, value: &Value) -> String {
        if value.is_null() {
            return self.config.null_value.clone();
        }

        let text = self.escape(&value.to_text());
        let enclose = &self.config.enclose_by;
        format!("{enclose}{text}{enclose}")
    }

    fn escape(&self, text: &str) -> String {
        if self.escaped.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'outer: while !rest.is_empty() {
            for sequence in &self.escaped {
                if let Some(tail) = rest.strip_prefix(sequence.as_str()) {
                    out.push_str(&self.config.escape_by);
                    out.push_str(sequence);
                    rest = tail;
                    continue 'outer;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, sqlkit::Record)]
    struct Row {
        id: i64,
        name: String,
        note: Option<String>,
    }

    fn row(name: &str, note: Option<&str>) -> Row {
        Row {
            id: 7,
            name: name.to_string(),
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn escapes_separators() {
        let stringifier = Stringifier::<Row>::new(ReaderConfig::default()).unwrap();
        assert_eq!(stringifier.columns(), ["id", "name", "note"]);
        assert_eq!(
            stringifier.stringify(&row("a,b\\c", None)),
            ["7", "a\\,b\\\\c", "\\N"]
        );
        assert_eq!(stringifier.line(&row("x", Some("y"))), "7,x,y\n");
    }

    #[test]
    fn encloses_and_honours_ignore_flags() {
        let config = ReaderConfig {
            enclose_by: "\"".to_string(),
            null_value: String::new(),
            stringify: StringifyConfig {
                ignore_field_separator: true,
                ..StringifyConfig::default()
            },
            ..ReaderConfig::default()
        };
        let stringifier = Stringifier::<Row>::new(config).unwrap();
        assert_eq!(
            stringifier.stringify(&row("a,\"b\"", None)),
            ["\"7\"", "\"a,\\\"b\\\"\"", ""]
        );
    }

    #[test]
    fn body_concatenates_lines() {
        let stringifier = Stringifier::<Row>::new(ReaderConfig::default()).unwrap();
        let body = stringifier.body(&[row("a", None), row("b", Some("n"))]);
        assert_eq!(String::from_utf8(body).unwrap(), "7,a,\\N\n7,b,n\n");
    }
}
