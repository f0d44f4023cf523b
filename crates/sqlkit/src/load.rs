//! Bulk loading through the product's native load path.

use crate::{field::Fields, Db, Inserter, Options, ReaderConfig, Stringifier};

use sqlkit_core::{Error, Record, Result};
use sqlkit_dialect::{Dialect, LoadStrategy};

/// Body format handed to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFormat {
    /// Delimited text laid out by the reader configuration
    Delimited(ReaderConfig),

    /// One JSON object per line
    JsonLines,

    /// Columnar files
    Parquet,
}

impl Default for LoadFormat {
    fn default() -> LoadFormat {
        LoadFormat::Delimited(ReaderConfig::default())
    }
}

/// Options of a [`Loader`].
///
/// ```
/// use sqlkit::{LoadConfig, LoadFormat};
///
/// let config = LoadConfig::new()
///     .format(LoadFormat::JsonLines)
///     .hint(serde_json::json!({"skip_leading_rows": 0}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoadConfig {
    pub(crate) format: LoadFormat,

    /// Backend-specific settings, passed to the driver as a `/*+ .. +*/`
    /// statement hint
    pub(crate) hint: Option<serde_json::Value>,
}

impl LoadConfig {
    pub fn new() -> LoadConfig {
        LoadConfig::default()
    }

    pub fn format(mut self, format: LoadFormat) -> LoadConfig {
        self.format = format;
        self
    }

    pub fn hint(mut self, hint: serde_json::Value) -> LoadConfig {
        self.hint = Some(hint);
        self
    }
}

/// Loads records of type `T` into a table.
///
/// Products with a streaming load path (`LOAD DATA LOCAL INFILE`,
/// `COPY .. FROM STDIN`) receive one body holding every record. Other
/// products fall back to batched inserts.
pub struct Loader<T> {
    db: Db,
    table: String,
    config: LoadConfig,
    inserter: Inserter<T>,
}

impl<T: Record> Loader<T> {
    pub fn new(db: Db, table: impl Into<String>, config: LoadConfig) -> Loader<T> {
        let table = table.into();
        Loader {
            inserter: Inserter::new(db.clone(), table.clone()),
            db,
            table,
            config,
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Loads `records` and returns the number of rows loaded.
    pub async fn load(&self, records: &mut [T], options: &Options) -> Result<u64> {
        if self.config.format == LoadFormat::Parquet {
            return Err(Error::unsupported("parquet load bodies are not supported"));
        }
        if records.is_empty() {
            return Ok(0);
        }

        let dialect = self.db.dialect(options).await?;
        if dialect.load == LoadStrategy::Undefined {
            tracing::debug!(table = %self.table, product = %dialect.product, "no native load, inserting");
            let outcome = self.inserter.insert(records, options).await?;
            return Ok(outcome.rows_affected);
        }

        let (sql, body) = self.render(&dialect, records)?;
        tracing::debug!(table = %self.table, sql = %sql, bytes = body.len(), "loading");

        let res = options
            .run(self.db.connection().load(&sql, body))
            .await
            .map_err(|e| e.context(sqlkit_core::err!("load into {} failed", self.table)))?;
        Ok(res.rows_affected)
    }

    /// Load statement and body for the dialect's load strategy.
    fn render(&self, dialect: &Dialect, records: &[T]) -> Result<(String, Vec<u8>)> {
        let columns: Vec<String> = Fields::<T>::of()?
            .data
            .iter()
            .map(|f| f.column_name())
            .collect();

        let (sql, body) = match (&self.config.format, dialect.load) {
            (LoadFormat::Delimited(config), LoadStrategy::LoadDataLocal) => {
                let stringifier = Stringifier::<T>::new(config.clone())?;
                let mut sql = format!(
                    "LOAD DATA LOCAL INFILE 'Reader::{}' INTO TABLE {} FIELDS TERMINATED BY '{}'",
                    self.table,
                    self.table,
                    quote(&config.field_separator)
                );
                if !config.enclose_by.is_empty() {
                    sql.push_str(&format!(" ENCLOSED BY '{}'", quote(&config.enclose_by)));
                }
                if !config.escape_by.is_empty() {
                    sql.push_str(&format!(" ESCAPED BY '{}'", quote(&config.escape_by)));
                }
                sql.push_str(&format!(
                    " LINES TERMINATED BY '{}' ({})",
                    quote(&config.object_separator),
                    columns.join(",")
                ));
                (sql, stringifier.body(records))
            }
            (LoadFormat::Delimited(config), LoadStrategy::CopyFromStdin) => {
                let stringifier = Stringifier::<T>::new(config.clone())?;
                let sql = format!(
                    "COPY {} ({}) FROM STDIN WITH (FORMAT text, DELIMITER '{}', NULL '{}')",
                    self.table,
                    columns.join(","),
                    quote(&config.field_separator),
                    quote(&config.null_value)
                );
                (sql, stringifier.body(records))
            }
            (LoadFormat::JsonLines, LoadStrategy::LoadDataLocal | LoadStrategy::CopyFromStdin) => {
                return Err(Error::unsupported(format!(
                    "{} cannot load JSON lines",
                    dialect.product
                )))
            }
            (format, strategy) => {
                return Err(Error::unsupported(format!(
                    "load of {format:?} through {strategy:?}"
                )))
            }
        };

        Ok((with_hint(sql, self.config.hint.as_ref()), body))
    }
}

/// Renders one JSON object per record, keyed by column name.
pub fn json_lines<T: Record>(records: &[T]) -> Result<Vec<u8>> {
    let fields = Fields::<T>::of()?;
    let mut body = vec![];
    for record in records {
        let object: serde_json::Map<String, serde_json::Value> = fields
            .data
            .iter()
            .map(|field| (field.column_name(), field.accessor.value(record).to_json()))
            .collect();
        serde_json::to_writer(&mut body, &object)?;
        body.push(b'\n');
    }
    Ok(body)
}

fn with_hint(sql: String, hint: Option<&serde_json::Value>) -> String {
    match hint {
        Some(hint) => format!("/*+ {hint} +*/ {sql}"),
        None => sql,
    }
}

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, sqlkit::Record)]
    struct Event {
        id: i64,
        name: String,
    }

    #[test]
    fn json_lines_use_column_names() {
        let events = [Event {
            id: 1,
            name: "a".to_string(),
        }];
        let body = json_lines(&events).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "{\"id\":1,\"name\":\"a\"}\n");
    }

    #[test]
    fn hint_prefixes_statement() {
        let hint = serde_json::json!({"k": 1});
        assert_eq!(with_hint("COPY t".to_string(), Some(&hint)), "/*+ {\"k\":1} +*/ COPY t");
        assert_eq!(quote("\t"), "\\t");
    }
}
