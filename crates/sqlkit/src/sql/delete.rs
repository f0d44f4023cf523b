use super::{batched::values_group, insert::join, Batched};

use sqlkit_dialect::Dialect;

/// `DELETE FROM t WHERE id IN (?,?)`, or `WHERE (c1,c2) IN ((?,?),(?,?))`
/// for composite keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    batched: Batched,
}

impl Delete {
    pub fn new<S: AsRef<str>>(table: &str, keys: &[S], dialect: &Dialect, batch_size: usize) -> Delete {
        let placeholders = dialect.placeholder_getter();

        let batched = if keys.len() == 1 {
            let prefix = format!("DELETE FROM {table} WHERE {} IN (", keys[0].as_ref());
            Batched::new(
                &prefix,
                batch_size,
                ",",
                placeholders,
                |placeholders| placeholders.next_placeholder(),
                ")",
            )
        } else {
            let prefix = format!("DELETE FROM {table} WHERE ({}) IN (", join(keys));
            Batched::new(
                &prefix,
                batch_size,
                ",",
                placeholders,
                values_group(keys.len()),
                ")",
            )
        };

        Delete { batched }
    }

    pub fn batch_size(&self) -> usize {
        self.batched.batch_size()
    }

    /// SQL deleting `size` rows.
    pub fn build(&self, size: usize) -> String {
        self.batched.build(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlkit_dialect::Placeholder;

    #[test]
    fn composite_key_batch() {
        let delete = Delete::new("foo", &["c1", "c2"], &Dialect::default(), 3);
        assert_eq!(
            delete.build(3),
            "DELETE FROM foo WHERE (c1,c2) IN ((?,?),(?,?),(?,?))"
        );
        assert_eq!(delete.build(2), "DELETE FROM foo WHERE (c1,c2) IN ((?,?),(?,?))");
    }

    #[test]
    fn single_key_batch() {
        let delete = Delete::new("foo", &["id"], &Dialect::default(), 4);
        assert_eq!(delete.build(4), "DELETE FROM foo WHERE id IN (?,?,?,?)");
        assert_eq!(delete.build(1), "DELETE FROM foo WHERE id IN (?)");
        assert_eq!(delete.build(9), delete.build(4));
    }

    #[test]
    fn truncation_matches_fresh_build() {
        let dialect = Dialect::default().with_placeholder(Placeholder::Numbered(":"));
        let large = Delete::new("foo", &["a", "b"], &dialect, 7);
        for size in 1..=7 {
            assert_eq!(large.build(size), Delete::new("foo", &["a", "b"], &dialect, size).build(size));
        }
    }
}
