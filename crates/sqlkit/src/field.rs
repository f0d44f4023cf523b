//! Flattened leaf fields of a record.

use sqlkit_core::{
    record::{Accessor, FieldKind},
    Column, Error, FieldDef, Record, Result, Tag,
};

use std::sync::Arc;

/// A leaf field reachable from the record root.
pub struct Field<T> {
    /// Rust field name
    pub name: &'static str,

    /// Dotted path from the record root, e.g. `address.city`
    pub path: String,

    /// Namespace prefix inherited from enclosing fields
    pub ns: String,

    pub tag: Arc<Tag>,

    pub accessor: Accessor<T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Field {
            name: self.name,
            path: self.path.clone(),
            ns: self.ns.clone(),
            tag: self.tag.clone(),
            accessor: self.accessor.clone(),
        }
    }
}

impl<T> core::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.path)
            .field("column", &self.column_name())
            .field("scan_type", self.accessor.scan_type())
            .finish()
    }
}

impl<T> Field<T> {
    /// Column written for this field: the namespace followed by the first
    /// declared alias or the field name.
    pub fn column_name(&self) -> String {
        let name = self.tag.column_name().unwrap_or(self.name);
        format!("{}{}", self.ns, name)
    }

    /// Names a result-set column may use to refer to this field, most
    /// specific first.
    pub fn candidates(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tag
            .column_names()
            .map(|alias| format!("{}{alias}", self.ns))
            .collect();
        names.push(format!("{}{}", self.ns, self.name));
        names
    }

    /// Column describing the field.
    pub fn column(&self) -> Column {
        let scan_type = self.accessor.scan_type().clone();
        Column::new(self.column_name())
            .with_nullable(scan_type.is_nullable())
            .with_scan_type(scan_type)
            .with_tag(self.tag.clone())
    }

    pub fn is_identity(&self) -> bool {
        self.tag.primary_key
    }
}

/// Every leaf field of a record, split into data fields and the fields of
/// the record's presence marker.
pub struct Fields<T> {
    pub data: Vec<Field<T>>,

    /// Leaf fields of the nested presence record, when the record has one
    pub presence: Option<Vec<Field<T>>>,

    /// Names of the transient fields that were skipped
    pub transient: Vec<&'static str>,
}

impl<T: Record> Fields<T> {
    /// Walks `T` depth first. Namespaced and embedded fields expand into
    /// their nested record; transient fields never appear.
    pub fn of() -> Result<Fields<T>> {
        let mut fields = Fields {
            data: vec![],
            presence: None,
            transient: vec![],
        };
        walk(T::fields()?, "", "", &mut fields)?;
        Ok(fields)
    }
}

impl<T> Fields<T> {
    /// Columns of the data fields, in field order.
    pub fn columns(&self) -> Vec<Column> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, field)| field.column().with_ordinal(i))
            .collect()
    }

    /// Position of the first primary key field.
    pub fn identity(&self) -> Option<usize> {
        self.data.iter().position(Field::is_identity)
    }

    /// Positions of every primary key field.
    pub fn identities(&self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_identity())
            .map(|(i, _)| i)
            .collect()
    }
}

fn walk<T: 'static>(defs: Vec<FieldDef<T>>, ns: &str, path: &str, out: &mut Fields<T>) -> Result<()> {
    for def in defs {
        if def.is_transient() {
            out.transient.push(def.name);
            continue;
        }

        let field_path = if path.is_empty() {
            def.name.to_string()
        } else {
            format!("{path}.{}", def.name)
        };

        match def.kind {
            FieldKind::Leaf(accessor) => out.data.push(Field {
                name: def.name,
                path: field_path,
                ns: ns.to_string(),
                tag: def.tag,
                accessor,
            }),
            FieldKind::Nested { fields, .. } if def.tag.presence => {
                if out.presence.is_some() {
                    return Err(Error::configuration(format!(
                        "multiple presence fields; second at {field_path}"
                    )));
                }

                let mut marker = Fields {
                    data: vec![],
                    presence: None,
                    transient: vec![],
                };
                walk(fields, "", &field_path, &mut marker)?;
                out.presence = Some(marker.data);
            }
            FieldKind::Nested { fields, .. } => {
                let nested_ns = format!("{ns}{}", def.tag.ns.as_deref().unwrap_or_default());
                walk(fields, &nested_ns, &field_path, out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, sqlkit::Record)]
    struct Audit {
        created_by: String,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Has {
        name: bool,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Account {
        #[sqlkit("id,autoincrement")]
        id: i64,
        #[sqlkit("account_name|name")]
        name: String,
        #[sqlkit("ns=audit_")]
        audit: Option<Box<Audit>>,
        #[sqlkit("presence")]
        has: Option<Has>,
        #[sqlkit("-")]
        scratch: String,
    }

    #[test]
    fn flattens_nested_and_skips_transient() {
        let fields = Fields::<Account>::of().unwrap();
        let names: Vec<_> = fields.data.iter().map(Field::column_name).collect();
        assert_eq!(names, ["id", "account_name", "audit_created_by"]);
        assert_eq!(fields.data[2].path, "audit.created_by");
        assert_eq!(fields.identity(), Some(0));
        assert_eq!(fields.transient, ["scratch"]);

        let presence = fields.presence.unwrap();
        assert_eq!(presence.len(), 1);
        assert_eq!(presence[0].path, "has.name");
    }

    #[test]
    fn candidates_carry_namespace() {
        let fields = Fields::<Account>::of().unwrap();
        assert_eq!(fields.data[1].candidates(), ["account_name", "name", "name"]);
        assert_eq!(fields.data[2].candidates(), ["audit_created_by"]);
    }
}
