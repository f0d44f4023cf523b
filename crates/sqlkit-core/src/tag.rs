use crate::{Error, Result};

/// Mapping metadata declared on a record field.
///
/// A tag is a comma separated list of `key[=value]` clauses. Keys are case
/// insensitive. A bare first clause that is not a known flag names the
/// column, so `"user_id,primaryKey"` is the same as
/// `"name=user_id,primaryKey=true"`. A tag of `-` marks the field transient.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Column name clause, possibly a `|` separated alias list
    pub column: Option<String>,

    /// Namespace prefix carried into nested fields
    pub ns: Option<String>,

    /// Field is (part of) the primary key
    pub primary_key: bool,

    /// Column value is generated by the database on insert
    pub autoincrement: bool,

    /// Named value generator
    pub generator: Option<String>,

    /// Sequence backing the column
    pub sequence: Option<String>,

    /// Field does not map to any column
    pub transient: bool,

    /// Column must not be NULL
    pub required: bool,

    /// Column value must be unique within `table`
    pub unique: bool,

    /// Table used by the uniqueness check
    pub table: Option<String>,

    /// Referenced table for the reference key check
    pub ref_table: Option<String>,

    /// Referenced column for the reference key check
    pub ref_column: Option<String>,

    /// Referenced database for the reference key check
    pub ref_db: Option<String>,

    /// Bind empty values as NULL
    pub nullify_empty: bool,

    /// Message reported by validation failures
    pub error_msg: Option<String>,

    /// Field holds the presence marker of its record
    pub presence: bool,
}

impl Tag {
    /// Parses a tag string.
    pub fn parse(raw: &str) -> Result<Tag> {
        let mut tag = Tag::default();
        let raw = raw.trim();

        if raw == "-" {
            tag.transient = true;
            return Ok(tag);
        }

        for (i, clause) in raw.split(',').enumerate() {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }

            let (key, value) = match clause.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (clause, None),
            };

            let flag = |value: Option<&str>| -> Result<bool> {
                match value.map(str::to_lowercase).as_deref() {
                    None | Some("") | Some("true") => Ok(true),
                    Some("false") => Ok(false),
                    Some(other) => Err(Error::configuration(format!(
                        "invalid tag {raw:?}: expected boolean for {key}, got {other:?}"
                    ))),
                }
            };
            let text = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);

            match key.to_lowercase().as_str() {
                "name" | "column" => tag.column = text(value),
                "ns" => tag.ns = text(value),
                "sequence" => tag.sequence = text(value),
                "primarykey" => tag.primary_key = flag(value)?,
                "autoincrement" => tag.autoincrement = flag(value)?,
                "generator" => {
                    let generator = text(value);
                    if generator
                        .as_deref()
                        .is_some_and(|g| g.eq_ignore_ascii_case("autoincrement"))
                    {
                        tag.autoincrement = true;
                    } else {
                        tag.generator = generator;
                    }
                }
                "-" | "transient" => tag.transient = flag(value)?,
                "required" | "notnull" => tag.required = flag(value)?,
                "unique" => tag.unique = flag(value)?,
                "table" => tag.table = text(value),
                "refcolumn" => tag.ref_column = text(value),
                "reftable" => tag.ref_table = text(value),
                "refdb" => tag.ref_db = text(value),
                "nullifyempty" => tag.nullify_empty = flag(value)?,
                "presence" => tag.presence = flag(value)?,
                "errormgs" | "errormsg" => tag.error_msg = text(value),
                _ if i == 0 && value.is_none() => tag.column = Some(key.to_string()),
                other => {
                    tracing::trace!(tag = raw, key = other, "ignoring unknown tag clause");
                }
            }
        }

        if tag.autoincrement {
            tag.primary_key = true;
        }

        Ok(tag)
    }

    /// Column aliases declared in the name clause.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.column
            .as_deref()
            .into_iter()
            .flat_map(|names| names.split('|'))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// First declared column alias.
    pub fn column_name(&self) -> Option<&str> {
        self.column_names().next()
    }

    /// Returns `true` when the field expands into a nested record.
    pub fn is_namespace(&self) -> bool {
        self.ns.is_some()
    }

    /// Returns `true` when the tag declares a reference key.
    pub fn has_reference(&self) -> bool {
        self.ref_table.is_some() && self.ref_column.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_first_clause_is_name() {
        let tag = Tag::parse("user_id,primaryKey").unwrap();
        assert_eq!(tag.column.as_deref(), Some("user_id"));
        assert!(tag.primary_key);
    }

    #[test]
    fn autoincrement_implies_primary_key() {
        let tag = Tag::parse("name=id,autoincrement").unwrap();
        assert!(tag.autoincrement);
        assert!(tag.primary_key);
    }

    #[test]
    fn generator_autoincrement_is_normalised() {
        let tag = Tag::parse("id,generator=autoincrement").unwrap();
        assert!(tag.autoincrement);
        assert!(tag.primary_key);
        assert_eq!(tag.generator, None);

        let tag = Tag::parse("id,generator=uuid").unwrap();
        assert!(!tag.autoincrement);
        assert_eq!(tag.generator.as_deref(), Some("uuid"));
    }

    #[test]
    fn transient() {
        assert!(Tag::parse("-").unwrap().transient);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let tag = Tag::parse("NAME=x,PrimaryKey=true,REFTABLE=users,refColumn=id").unwrap();
        assert_eq!(tag.column.as_deref(), Some("x"));
        assert!(tag.primary_key);
        assert!(tag.has_reference());
    }

    #[test]
    fn aliases() {
        let tag = Tag::parse("name=a|b|c").unwrap();
        assert_eq!(tag.column_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(tag.column_name(), Some("a"));
    }

    #[test]
    fn validation_clauses() {
        let tag = Tag::parse("email,unique,table=users,required,errorMgs=email taken").unwrap();
        assert!(tag.unique);
        assert!(tag.required);
        assert_eq!(tag.table.as_deref(), Some("users"));
        assert_eq!(tag.error_msg.as_deref(), Some("email taken"));
    }

    #[test]
    fn invalid_boolean() {
        assert!(Tag::parse("id,primaryKey=maybe").is_err());
    }

    #[test]
    fn namespace() {
        let tag = Tag::parse("ns=z").unwrap();
        assert!(tag.is_namespace());
        assert_eq!(tag.column, None);
    }
}
