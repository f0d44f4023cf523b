use super::{batched::values_group, Batched};

use sqlkit_dialect::Dialect;

/// `INSERT INTO t (c1,c2) VALUES (?,?),(?,?)`, optionally followed by
/// `RETURNING`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    batched: Batched,
}

impl Insert {
    pub fn new<S: AsRef<str>>(table: &str, columns: &[S], dialect: &Dialect, batch_size: usize) -> Insert {
        Insert::with_suffix(table, columns, dialect, batch_size, String::new())
    }

    /// Reads `column` back for every inserted row.
    pub fn returning<S: AsRef<str>>(
        table: &str,
        columns: &[S],
        column: &str,
        dialect: &Dialect,
        batch_size: usize,
    ) -> Insert {
        Insert::with_suffix(table, columns, dialect, batch_size, format!(" RETURNING {column}"))
    }

    pub(crate) fn with_suffix<S: AsRef<str>>(
        table: &str,
        columns: &[S],
        dialect: &Dialect,
        batch_size: usize,
        suffix: String,
    ) -> Insert {
        let prefix = format!("INSERT INTO {table} ({}) VALUES ", join(columns));
        Insert {
            batched: Batched::new(
                &prefix,
                batch_size,
                ",",
                dialect.placeholder_getter(),
                values_group(columns.len()),
                suffix,
            ),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batched.batch_size()
    }

    /// SQL inserting `size` rows.
    pub fn build(&self, size: usize) -> String {
        self.batched.build(size)
    }
}

pub(crate) fn join<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlkit_dialect::Placeholder;

    #[test]
    fn renders_groups() {
        let insert = Insert::new("foo", &["id", "name"], &Dialect::default(), 3);
        assert_eq!(
            insert.build(3),
            "INSERT INTO foo (id,name) VALUES (?,?),(?,?),(?,?)"
        );
        assert_eq!(insert.build(1), "INSERT INTO foo (id,name) VALUES (?,?)");
    }

    #[test]
    fn truncation_matches_fresh_build() {
        let dialect = Dialect::default().with_placeholder(Placeholder::Numbered("$"));
        let large = Insert::returning("foo", &["a", "b"], "id", &dialect, 10);

        for size in 1..=10 {
            let fresh = Insert::returning("foo", &["a", "b"], "id", &dialect, size);
            assert_eq!(large.build(size), fresh.build(size));
        }
        assert_eq!(
            large.build(2),
            "INSERT INTO foo (a,b) VALUES ($1,$2),($3,$4) RETURNING id"
        );
    }
}
