//! Precondition checks of records against the live database.

use crate::{
    field::{Field, Fields},
    Db, Options, Presence,
};

use sqlkit_core::{Error, Record, Result, Value, Violation};
use sqlkit_dialect::Dialect;

use std::collections::HashSet;

/// Checks a [`Validator`] runs.
///
/// ```
/// use sqlkit::Validation;
///
/// let validation = Validation::new().table("users").for_update(true);
/// ```
#[derive(Debug, Clone)]
pub struct Validation {
    pub(crate) not_null: bool,
    pub(crate) unique: bool,
    pub(crate) ref_key: bool,

    /// Table of `unique` fields that do not name one
    pub(crate) table: Option<String>,

    /// Records already exist; a unique value held by the record's own row
    /// is not a violation
    pub(crate) for_update: bool,
}

impl Default for Validation {
    fn default() -> Validation {
        Validation {
            not_null: true,
            unique: true,
            ref_key: true,
            table: None,
            for_update: false,
        }
    }
}

impl Validation {
    pub fn new() -> Validation {
        Validation::default()
    }

    pub fn not_null(mut self, enabled: bool) -> Validation {
        self.not_null = enabled;
        self
    }

    pub fn unique(mut self, enabled: bool) -> Validation {
        self.unique = enabled;
        self
    }

    pub fn ref_key(mut self, enabled: bool) -> Validation {
        self.ref_key = enabled;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Validation {
        self.table = Some(table.into());
        self
    }

    pub fn for_update(mut self, for_update: bool) -> Validation {
        self.for_update = for_update;
        self
    }
}

/// Validates records against `required`, `unique` and reference key tags.
///
/// Every violation found is collected and reported in one
/// [`Error::validation`].
#[derive(Debug, Clone)]
pub struct Validator {
    db: Db,
}

impl Validator {
    pub fn new(db: Db) -> Validator {
        Validator { db }
    }

    /// Fails with a validation error listing every violation.
    pub async fn validate<T: Record>(
        &self,
        records: &[T],
        validation: &Validation,
        options: &Options,
    ) -> Result<()> {
        let violations = self.violations(records, validation, options).await?;
        if violations.is_empty() {
            Ok(())
        } else {
            tracing::debug!(count = violations.len(), "validation failed");
            Err(Error::validation(violations))
        }
    }

    /// Every violation in `records`, in check then record order.
    pub async fn violations<T: Record>(
        &self,
        records: &[T],
        validation: &Validation,
        options: &Options,
    ) -> Result<Vec<Violation>> {
        let fields = Fields::<T>::of()?;
        let presence = match options.ignore_presence {
            false => Presence::from_fields(&fields)?,
            true => None,
        };
        let check = Check {
            fields: &fields,
            presence: presence.as_ref(),
            records,
        };

        let mut violations = vec![];
        if validation.not_null {
            violations.extend(check.not_null());
        }
        if records.is_empty() || !(validation.unique || validation.ref_key) {
            return Ok(violations);
        }

        let dialect = self.db.dialect(options).await?;
        let mut options = options.clone();
        options.cache = None;

        for (position, field) in fields.data.iter().enumerate() {
            if validation.unique && field.tag.unique {
                let table = field
                    .tag
                    .table
                    .as_deref()
                    .or(validation.table.as_deref())
                    .ok_or_else(|| {
                        Error::configuration(format!("unique field {} names no table", field.path))
                    })?;
                let found = self
                    .unique(&check, position, table, &dialect, validation.for_update, &options)
                    .await?;
                violations.extend(found);
            }

            if validation.ref_key && field.tag.has_reference() {
                violations.extend(self.ref_key(&check, position, &dialect, &options).await?);
            }
        }

        Ok(violations)
    }

    async fn unique<T: Record>(
        &self,
        check: &Check<'_, T>,
        position: usize,
        table: &str,
        dialect: &Dialect,
        for_update: bool,
        options: &Options,
    ) -> Result<Vec<Violation>> {
        let field = &check.fields.data[position];
        let values = check.set_values(position);
        if values.is_empty() {
            return Ok(vec![]);
        }

        let column = field.column_name();
        let mut getter = dialect.placeholder_getter();
        let mut args: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
        let mut sql = format!(
            "SELECT {column} FROM {table} WHERE {column} IN ({})",
            placeholders(&mut getter, args.len())
        );

        if let (true, Some(id)) = (for_update, check.fields.identity()) {
            let ids: Vec<Value> = check
                .records
                .iter()
                .map(|record| check.fields.data[id].accessor.value(record))
                .filter(|value| !value.is_zero())
                .collect();
            if !ids.is_empty() {
                sql.push_str(&format!(
                    " AND {} NOT IN ({})",
                    check.fields.data[id].column_name(),
                    placeholders(&mut getter, ids.len())
                ));
                args.extend(ids);
            }
        }

        let existing = self.lookup(sql, &args, options).await?;
        Ok(values
            .into_iter()
            .filter(|(_, value)| existing.contains(&value.to_text()))
            .map(|(i, value)| {
                let text = value.to_text();
                let message = field
                    .tag
                    .error_msg
                    .clone()
                    .unwrap_or_else(|| format!("{} value: {text} already exists", field.name));
                violation(i, field, text, "unique", message)
            })
            .collect())
    }

    async fn ref_key<T: Record>(
        &self,
        check: &Check<'_, T>,
        position: usize,
        dialect: &Dialect,
        options: &Options,
    ) -> Result<Vec<Violation>> {
        let field = &check.fields.data[position];
        let values = check.set_values(position);
        if values.is_empty() {
            return Ok(vec![]);
        }

        let (Some(ref_table), Some(ref_column)) = (&field.tag.ref_table, &field.tag.ref_column) else {
            return Ok(vec![]);
        };
        let ref_table = match &field.tag.ref_db {
            Some(db) => format!("{db}.{ref_table}"),
            None => ref_table.clone(),
        };

        let args: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
        let sql = format!(
            "SELECT {ref_column} FROM {ref_table} WHERE {ref_column} IN ({})",
            placeholders(&mut dialect.placeholder_getter(), args.len())
        );

        let existing = self.lookup(sql, &args, options).await?;
        Ok(values
            .into_iter()
            .filter(|(_, value)| !existing.contains(&value.to_text()))
            .map(|(i, value)| {
                let text = value.to_text();
                let message = field.tag.error_msg.clone().unwrap_or_else(|| {
                    format!("{} value: {text} does not exist in {ref_table}", field.name)
                });
                violation(i, field, text, "refKey", message)
            })
            .collect())
    }

    /// Text of the first column of every row of `sql`.
    async fn lookup(&self, sql: String, args: &[Value], options: &Options) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        self.db
            .reader(sql)
            .query_all_with_slice(args, options, |row| {
                if let Some(value) = row.first() {
                    found.insert(value.to_text());
                }
                Ok(true)
            })
            .await?;
        Ok(found)
    }
}

struct Check<'a, T> {
    fields: &'a Fields<T>,
    presence: Option<&'a Presence<T>>,
    records: &'a [T],
}

impl<T: 'static> Check<'_, T> {
    fn is_set(&self, record: &T, position: usize) -> bool {
        self.presence
            .map_or(true, |presence| presence.is_field_set(record, position))
    }

    fn not_null(&self) -> Vec<Violation> {
        let mut violations = vec![];
        for (position, field) in self.fields.data.iter().enumerate() {
            if !field.tag.required {
                continue;
            }
            for (i, record) in self.records.iter().enumerate() {
                if !self.is_set(record, position) || !field.accessor.value(record).is_null() {
                    continue;
                }
                let message = field
                    .tag
                    .error_msg
                    .clone()
                    .unwrap_or_else(|| format!("{} is required", field.name));
                violations.push(violation(i, field, String::new(), "notnull", message));
            }
        }
        violations
    }

    /// Distinct set values of the field at `position`, with the index of the
    /// first record holding each.
    fn set_values(&self, position: usize) -> Vec<(usize, Value)> {
        let field = &self.fields.data[position];
        let mut seen = HashSet::new();
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| self.is_set(record, position))
            .map(|(i, record)| (i, field.accessor.value(record)))
            .filter(|(_, value)| !value.is_null() && seen.insert(value.to_text()))
            .collect()
    }
}

fn placeholders(getter: &mut sqlkit_dialect::PlaceholderGetter, count: usize) -> String {
    (0..count)
        .map(|_| getter.next_placeholder())
        .collect::<Vec<_>>()
        .join(",")
}

fn violation<T>(index: usize, field: &Field<T>, value: String, check: &'static str, message: String) -> Violation {
    Violation {
        location: format!("[{index}].{}", field.name),
        field: field.name.to_string(),
        value,
        check,
        message,
    }
}
