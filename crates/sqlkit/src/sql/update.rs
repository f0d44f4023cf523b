use sqlkit_dialect::{Dialect, Placeholder};

/// `UPDATE t SET c1 = ?, c2 = ? WHERE id = ?`.
///
/// Every column that is not an identity column is a set column. A build
/// lists only the set columns flagged in its mask and returns `""` when none
/// is flagged.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    prefix: String,
    set_columns: Vec<String>,
    identity_columns: Vec<String>,
    placeholder: Placeholder,

    /// `WHERE` clause, pre-rendered for fixed placeholders
    suffix: Option<String>,
}

impl Update {
    /// `identities` are positions in `columns`.
    pub fn new<S: AsRef<str>>(table: &str, columns: &[S], identities: &[usize], dialect: &Dialect) -> Update {
        let set_columns = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !identities.contains(i))
            .map(|(_, column)| column.as_ref().to_string())
            .collect();
        let identity_columns = identities
            .iter()
            .filter_map(|i| columns.get(*i))
            .map(|column| column.as_ref().to_string())
            .collect();

        let mut update = Update {
            prefix: format!("UPDATE {table} SET "),
            set_columns,
            identity_columns,
            placeholder: dialect.placeholder,
            suffix: None,
        };
        if !update.placeholder.is_numbered() {
            update.suffix = Some(update.render_suffix(&mut update.placeholder.getter()));
        }
        update
    }

    /// Columns the `SET` list is made of, in order.
    pub fn set_columns(&self) -> &[String] {
        &self.set_columns
    }

    pub fn identity_columns(&self) -> &[String] {
        &self.identity_columns
    }

    /// SQL setting every set column.
    pub fn build_all(&self) -> String {
        self.build(&vec![true; self.set_columns.len()])
    }

    /// SQL setting the set columns flagged in `mask`.
    pub fn build(&self, mask: &[bool]) -> String {
        let flagged = self
            .set_columns
            .iter()
            .zip(mask)
            .filter(|(_, set)| **set)
            .count();
        if flagged == 0 {
            return String::new();
        }

        let estimate = self.prefix.len()
            + flagged * 8
            + self.set_columns.iter().map(String::len).sum::<usize>()
            + self.identity_columns.iter().map(|c| c.len() + 10).sum::<usize>();
        let mut sql = String::with_capacity(estimate);
        sql.push_str(&self.prefix);

        let mut placeholders = self.placeholder.getter();
        let mut first = true;
        for (column, _) in self.set_columns.iter().zip(mask).filter(|(_, set)| **set) {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            sql.push_str(column);
            sql.push_str(" = ");
            sql.push_str(&placeholders.next_placeholder());
        }

        match &self.suffix {
            Some(suffix) => sql.push_str(suffix),
            None => sql.push_str(&self.render_suffix(&mut placeholders)),
        }
        sql
    }

    fn render_suffix(&self, placeholders: &mut sqlkit_dialect::PlaceholderGetter) -> String {
        let criteria: Vec<_> = self
            .identity_columns
            .iter()
            .map(|column| format!("{column} = {}", placeholders.next_placeholder()))
            .collect();
        format!(" WHERE {}", criteria.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_columns_single_key() {
        let update = Update::new("foo", &["c1", "cN", "cId"], &[2], &Dialect::default());
        assert_eq!(update.build_all(), "UPDATE foo SET c1 = ?, cN = ? WHERE cId = ?");
        assert_eq!(update.build(&[true, false]), "UPDATE foo SET c1 = ? WHERE cId = ?");
        assert_eq!(update.build(&[false, false]), "");
    }

    #[test]
    fn numbered_placeholders_continue_into_where() {
        let dialect = Dialect::default().with_placeholder(Placeholder::Numbered("$"));
        let update = Update::new("foo", &["id", "a", "b", "k"], &[0, 3], &dialect);
        assert_eq!(
            update.build(&[false, true]),
            "UPDATE foo SET b = $1 WHERE id = $2 AND k = $3"
        );
    }
}
