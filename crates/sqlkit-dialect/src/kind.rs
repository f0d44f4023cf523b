use sqlkit_core::{Error, Result};

/// Catalog concept a metadata query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Version,
    Catalogs,
    CurrentCatalog,
    Schemas,
    CurrentSchema,
    Tables,
    Views,
    /// Columns of a table
    Table,
    PrimaryKeys,
    ForeignKeys,
    Indexes,
    /// Columns of one index
    Index,
    Sequences,
    SequenceNextValue,
    Functions,
    Session,
    FkCheckOn,
    FkCheckOff,
}

impl Kind {
    pub const ALL: [Kind; 18] = [
        Kind::Version,
        Kind::Catalogs,
        Kind::CurrentCatalog,
        Kind::Schemas,
        Kind::CurrentSchema,
        Kind::Tables,
        Kind::Views,
        Kind::Table,
        Kind::PrimaryKeys,
        Kind::ForeignKeys,
        Kind::Indexes,
        Kind::Index,
        Kind::Sequences,
        Kind::SequenceNextValue,
        Kind::Functions,
        Kind::Session,
        Kind::FkCheckOn,
        Kind::FkCheckOff,
    ];

    /// Logical argument names, in positional order.
    pub fn arguments(self) -> &'static [&'static str] {
        const CATALOG: &[&str] = &["Catalog"];
        const SCHEMA: &[&str] = &["Catalog", "Schema"];
        const TABLE: &[&str] = &["Catalog", "Schema", "Table"];

        match self {
            Kind::Version
            | Kind::Catalogs
            | Kind::CurrentCatalog
            | Kind::CurrentSchema
            | Kind::Session
            | Kind::FkCheckOn
            | Kind::FkCheckOff => &[],
            Kind::Schemas => CATALOG,
            Kind::Tables | Kind::Views | Kind::Sequences | Kind::Functions => SCHEMA,
            Kind::Table | Kind::PrimaryKeys | Kind::ForeignKeys | Kind::Indexes => TABLE,
            Kind::Index => &["Catalog", "Schema", "Table", "Index"],
            Kind::SequenceNextValue => &["Catalog", "Schema", "Sequence"],
        }
    }
}

impl core::fmt::Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

/// One positional argument of a metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Logical argument name, fixed per kind
    pub name: &'static str,

    /// Backend column compared against the argument, empty when the argument
    /// is only substituted into the SQL text
    pub column: String,
}

/// Ordered argument contract of a metadata query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria(pub Vec<Criterion>);

impl Criteria {
    /// Criteria for `kind` with the given backend columns, in argument order.
    /// Missing columns are left empty; extra columns are ignored.
    pub fn for_kind(kind: Kind, columns: &[&str]) -> Criteria {
        Criteria(
            kind.arguments()
                .iter()
                .enumerate()
                .map(|(i, name)| Criterion {
                    name,
                    column: columns.get(i).copied().unwrap_or_default().to_string(),
                })
                .collect(),
        )
    }

    /// Checks the criteria against the argument contract of `kind`.
    pub fn validate(&self, kind: Kind) -> Result<()> {
        let expected = kind.arguments();
        let actual: Vec<_> = self.0.iter().map(|criterion| criterion.name).collect();

        if actual != expected {
            return Err(Error::configuration(format!(
                "invalid criteria for {kind}: expected {expected:?}, got {actual:?}"
            )));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_kind_pads_columns() {
        let criteria = Criteria::for_kind(Kind::Table, &["table_catalog"]);
        assert_eq!(criteria.len(), 3);
        assert_eq!(criteria.0[0].column, "table_catalog");
        assert_eq!(criteria.0[2].name, "Table");
        assert_eq!(criteria.0[2].column, "");
        assert!(criteria.validate(Kind::Table).is_ok());
    }

    #[test]
    fn validate_rejects_other_kinds() {
        let criteria = Criteria::for_kind(Kind::Tables, &[]);
        assert!(criteria.validate(Kind::Tables).is_ok());
        assert!(criteria.validate(Kind::Index).unwrap_err().is_configuration());
    }

    #[test]
    fn every_kind_has_valid_default_criteria() {
        for kind in Kind::ALL {
            assert!(Criteria::for_kind(kind, &[]).validate(kind).is_ok());
        }
    }
}
