use super::{batched::values_group, insert::join, Batched};

use sqlkit_core::{Error, Result};
use sqlkit_dialect::{Dialect, UpsertStrategy};

/// Insert-or-update in the dialect's native form:
///
/// * `INSERT .. ON CONFLICT (k) DO UPDATE SET c = excluded.c`
/// * `INSERT .. ON DUPLICATE KEY UPDATE c = VALUES(c)`
/// * `MERGE INTO t USING (SELECT ? AS k, ? AS c UNION ALL ..) s ON (..) ..`
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    batched: Batched,
}

impl Upsert {
    /// `keys` are positions in `columns` identifying a row.
    pub fn new<S: AsRef<str>>(
        table: &str,
        columns: &[S],
        keys: &[usize],
        dialect: &Dialect,
        batch_size: usize,
    ) -> Result<Upsert> {
        if keys.is_empty() {
            return Err(Error::missing_identity(table));
        }

        let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        let key_names: Vec<&str> = keys.iter().filter_map(|i| names.get(*i).copied()).collect();
        let updates: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !keys.contains(i))
            .map(|(_, name)| *name)
            .collect();

        let insert_prefix = format!("INSERT INTO {table} ({}) VALUES ", join(&names));
        let placeholders = dialect.placeholder_getter();

        let batched = match dialect.upsert {
            UpsertStrategy::OnConflict => {
                let action = if updates.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    let set: Vec<_> = updates
                        .iter()
                        .map(|c| format!("{c} = excluded.{c}"))
                        .collect();
                    format!("DO UPDATE SET {}", set.join(", "))
                };
                Batched::new(
                    &insert_prefix,
                    batch_size,
                    ",",
                    placeholders,
                    values_group(names.len()),
                    format!(" ON CONFLICT ({}) {action}", key_names.join(",")),
                )
            }
            UpsertStrategy::OnDuplicateKey => {
                let set: Vec<_> = if updates.is_empty() {
                    key_names.iter().map(|c| format!("{c} = {c}")).collect()
                } else {
                    updates.iter().map(|c| format!("{c} = VALUES({c})")).collect()
                };
                Batched::new(
                    &insert_prefix,
                    batch_size,
                    ",",
                    placeholders,
                    values_group(names.len()),
                    format!(" ON DUPLICATE KEY UPDATE {}", set.join(", ")),
                )
            }
            UpsertStrategy::MergeInto => {
                let on: Vec<_> = key_names.iter().map(|c| format!("t.{c} = s.{c}")).collect();
                let mut suffix = format!(") s ON ({})", on.join(" AND "));
                if !updates.is_empty() {
                    let set: Vec<_> = updates.iter().map(|c| format!("t.{c} = s.{c}")).collect();
                    suffix.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {}", set.join(", ")));
                }
                let source: Vec<_> = names.iter().map(|c| format!("s.{c}")).collect();
                suffix.push_str(&format!(
                    " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
                    join(&names),
                    source.join(", ")
                ));

                let width = names.len();
                let mut first = true;
                Batched::new(
                    &format!("MERGE INTO {table} t USING ("),
                    batch_size,
                    " UNION ALL ",
                    placeholders,
                    move |placeholders| {
                        let cells: Vec<_> = (0..width)
                            .map(|i| {
                                let placeholder = placeholders.next_placeholder();
                                if first {
                                    format!("{placeholder} AS {}", names[i])
                                } else {
                                    placeholder
                                }
                            })
                            .collect();
                        first = false;
                        format!("SELECT {}", cells.join(", "))
                    },
                    suffix,
                )
            }
            UpsertStrategy::Undefined => {
                return Err(Error::unsupported(format!(
                    "{} has no native upsert",
                    dialect.product
                )))
            }
        };

        Ok(Upsert { batched })
    }

    pub fn batch_size(&self) -> usize {
        self.batched.batch_size()
    }

    /// SQL upserting `size` rows.
    pub fn build(&self, size: usize) -> String {
        self.batched.build(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlkit_dialect::Product;

    fn dialect(upsert: UpsertStrategy) -> Dialect {
        Dialect::default().with_upsert(upsert)
    }

    #[test]
    fn on_conflict() {
        let upsert = Upsert::new("foo", &["id", "name"], &[0], &dialect(UpsertStrategy::OnConflict), 2).unwrap();
        assert_eq!(
            upsert.build(2),
            "INSERT INTO foo (id,name) VALUES (?,?),(?,?) ON CONFLICT (id) DO UPDATE SET name = excluded.name"
        );
    }

    #[test]
    fn on_duplicate_key() {
        let upsert =
            Upsert::new("foo", &["id", "name"], &[0], &dialect(UpsertStrategy::OnDuplicateKey), 1).unwrap();
        assert_eq!(
            upsert.build(1),
            "INSERT INTO foo (id,name) VALUES (?,?) ON DUPLICATE KEY UPDATE name = VALUES(name)"
        );
    }

    #[test]
    fn merge_into() {
        let upsert = Upsert::new("foo", &["id", "name"], &[0], &dialect(UpsertStrategy::MergeInto), 2).unwrap();
        assert_eq!(
            upsert.build(2),
            "MERGE INTO foo t USING (SELECT ? AS id, ? AS name UNION ALL SELECT ?, ?) s ON (t.id = s.id) \
             WHEN MATCHED THEN UPDATE SET t.name = s.name \
             WHEN NOT MATCHED THEN INSERT (id,name) VALUES (s.id, s.name)"
        );
        assert_eq!(
            upsert.build(1),
            Upsert::new("foo", &["id", "name"], &[0], &dialect(UpsertStrategy::MergeInto), 1)
                .unwrap()
                .build(1)
        );
    }

    #[test]
    fn undefined_is_unsupported() {
        let dialect = Dialect::new(Product::new("x", "x"));
        let err = Upsert::new("foo", &["id"], &[0], &dialect, 1).unwrap_err();
        assert!(err.is_unsupported());
    }
}
