use crate::{Criteria, Dialect, Kind, Product};

use sqlkit_core::{async_trait, Connection, Result, Value};

use std::{fmt::Debug, sync::Arc};

/// A catalog query registered for a product version.
#[derive(Debug, Clone)]
pub struct MetadataQuery {
    pub kind: Kind,

    /// SQL template. `$Args[i]` is replaced with the i-th argument and
    /// `$WHERE` with the generated criteria.
    pub sql: String,

    /// Product and minimum version the query applies to
    pub product: Product,

    pub criteria: Criteria,

    /// Run before the query; may answer it without touching the database
    pub pre: Vec<Arc<dyn Handler>>,

    /// Run after the query over the fetched rows
    pub post: Vec<Arc<dyn Handler>>,
}

/// Hook run around a metadata query.
#[async_trait]
pub trait Handler: Debug + Send + Sync {
    /// Inspects or fills `rows`. Returning `false` stops further processing:
    /// a pre-handler returning `false` answers the query with `rows`.
    async fn handle(&self, conn: &dyn Connection, args: &[String], rows: &mut Rowset) -> Result<bool>;
}

/// Rows fetched by, or produced for, a metadata query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rowset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// SQL and bind arguments ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<Value>,
}

impl MetadataQuery {
    pub fn new(kind: Kind, sql: impl Into<String>, product: Product) -> MetadataQuery {
        MetadataQuery {
            kind,
            sql: sql.into(),
            product,
            criteria: Criteria::for_kind(kind, &[]),
            pre: vec![],
            post: vec![],
        }
    }

    /// Sets the backend columns compared against each argument.
    pub fn with_criteria(mut self, columns: &[&str]) -> MetadataQuery {
        self.criteria = Criteria::for_kind(self.kind, columns);
        self
    }

    pub fn with_pre(mut self, handler: impl Handler + 'static) -> MetadataQuery {
        self.pre.push(Arc::new(handler));
        self
    }

    pub fn with_post(mut self, handler: impl Handler + 'static) -> MetadataQuery {
        self.post.push(Arc::new(handler));
        self
    }

    /// Renders the SQL template for `args`.
    ///
    /// Empty arguments elide their `$Args[i].` qualifier. Each criterion with a
    /// backend column and a non-empty argument becomes `column = <placeholder>`;
    /// the conditions replace `$WHERE` or are appended to the statement.
    pub fn render(&self, dialect: &Dialect, args: &[String]) -> Rendered {
        let mut sql = self.sql.clone();

        let max_arg = self.criteria.len().max(args.len());
        for i in 0..max_arg {
            let token = format!("$Args[{i}]");
            match args.get(i).map(String::as_str) {
                Some(arg) if !arg.is_empty() => sql = sql.replace(&token, arg),
                _ => sql = sql.replace(&format!("{token}."), "").replace(&token, ""),
            }
        }

        let mut placeholders = dialect.placeholder_getter();
        let mut conditions = vec![];
        let mut bound = vec![];

        for (criterion, arg) in self.criteria.iter().zip(args) {
            if criterion.column.is_empty() || arg.is_empty() {
                continue;
            }
            conditions.push(format!(
                "{} = {}",
                criterion.column,
                placeholders.next_placeholder()
            ));
            bound.push(Value::String(arg.clone()));
        }

        let sql = match sql.find("$WHERE") {
            Some(at) => {
                let clause = where_clause(&sql[..at], &conditions);
                sql.replacen("$WHERE", &clause, 1)
            }
            None if conditions.is_empty() => sql,
            None => {
                let clause = where_clause(&sql, &conditions);
                format!("{sql} {clause}")
            }
        };

        Rendered { sql, args: bound }
    }
}

fn where_clause(preceding: &str, conditions: &[String]) -> String {
    if conditions.is_empty() {
        return String::new();
    }

    let keyword = if has_where(preceding) { "AND" } else { "WHERE" };
    format!("{keyword} {}", conditions.join(" AND "))
}

fn has_where(sql: &str) -> bool {
    sql.to_uppercase()
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| word == "WHERE")
}

/// Post-handler prefixing a product name onto version banners that lack one.
#[derive(Debug, Clone)]
pub struct NamePrefix(pub &'static str);

#[async_trait]
impl Handler for NamePrefix {
    async fn handle(&self, _conn: &dyn Connection, _args: &[String], rows: &mut Rowset) -> Result<bool> {
        for row in &mut rows.rows {
            if let Some(Value::String(banner)) = row.first_mut() {
                if banner.starts_with(|c: char| c.is_ascii_digit()) {
                    *banner = format!("{} {banner}", self.0);
                }
            }
        }
        Ok(true)
    }
}

/// Pre-handler answering a query with a fixed row set.
#[derive(Debug, Clone)]
pub struct StaticRows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl StaticRows {
    pub fn single(column: &str, value: impl Into<Value>) -> StaticRows {
        StaticRows {
            columns: vec![column.to_string()],
            rows: vec![vec![value.into()]],
        }
    }
}

#[async_trait]
impl Handler for StaticRows {
    async fn handle(&self, _conn: &dyn Connection, _args: &[String], rows: &mut Rowset) -> Result<bool> {
        rows.columns = self.columns.clone();
        rows.rows = self.rows.clone();
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Placeholder;
    use pretty_assertions::assert_eq;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn appends_criteria() {
        let query = MetadataQuery::new(
            Kind::Tables,
            "SELECT table_name FROM information_schema.tables",
            Product::default(),
        )
        .with_criteria(&["table_catalog", "table_schema"]);

        let dialect = Dialect::default().with_placeholder(Placeholder::Numbered("$"));
        let rendered = query.render(&dialect, &args(&["", "public"]));
        assert_eq!(
            rendered.sql,
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1"
        );
        assert_eq!(rendered.args, vec![Value::from("public")]);
    }

    #[test]
    fn appends_to_existing_where() {
        let query = MetadataQuery::new(
            Kind::Tables,
            "SELECT name FROM t WHERE kind = 'table'",
            Product::default(),
        )
        .with_criteria(&["cat", "sch"]);

        let rendered = query.render(&Dialect::default(), &args(&["a", "b"]));
        assert_eq!(
            rendered.sql,
            "SELECT name FROM t WHERE kind = 'table' AND cat = ? AND sch = ?"
        );
    }

    #[test]
    fn where_marker() {
        let query = MetadataQuery::new(
            Kind::Schemas,
            "SELECT name FROM s $WHERE ORDER BY name",
            Product::default(),
        )
        .with_criteria(&["cat"]);

        let rendered = query.render(&Dialect::default(), &args(&["c"]));
        assert_eq!(rendered.sql, "SELECT name FROM s WHERE cat = ? ORDER BY name");

        let rendered = query.render(&Dialect::default(), &args(&[]));
        assert_eq!(rendered.sql, "SELECT name FROM s  ORDER BY name");
        assert!(rendered.args.is_empty());
    }

    #[test]
    fn substitutes_and_elides_args() {
        let query = MetadataQuery::new(
            Kind::Table,
            "SELECT * FROM $Args[1].pragma_table_info('$Args[2]')",
            Product::default(),
        );

        let rendered = query.render(&Dialect::default(), &args(&["", "", "users"]));
        assert_eq!(rendered.sql, "SELECT * FROM pragma_table_info('users')");

        let rendered = query.render(&Dialect::default(), &args(&["", "aux", "users"]));
        assert_eq!(rendered.sql, "SELECT * FROM aux.pragma_table_info('users')");
    }
}
