//! Record types and field address functions.
//!
//! A [`Record`] describes its fields as a tree of [`FieldDef`]s. Leaf fields
//! carry an [`Accessor`]: a pair of closures that, given a record, return the
//! cell to read from or scan into. Nested fields have already been projected
//! onto the outer record, so an accessor always starts from the record root.
//! Optional owners (`Option<T>`, `Option<Box<T>>`) are materialised with
//! `Default` on first mutable access and read as NULL while absent.

use crate::{Cell, Result, ScanType, Tag, Value};

use std::sync::Arc;

/// A type whose values can be mapped to and from result-set rows.
///
/// Usually implemented with `#[derive(Record)]`.
pub trait Record: Default + Send + Sync + 'static {
    /// Describes the fields of the record, in declaration order.
    fn fields() -> Result<Vec<FieldDef<Self>>>;

    /// Stable signature of the record type, used in cache keys.
    fn type_signature() -> &'static str {
        std::any::type_name::<Self>()
    }
}

type GetFn<T> = Arc<dyn for<'a> Fn(&'a T) -> Option<&'a dyn Cell> + Send + Sync>;
type GetMutFn<T> = Arc<dyn for<'a> Fn(&'a mut T) -> &'a mut (dyn Cell) + Send + Sync>;

fn getter<T, F>(f: F) -> GetFn<T>
where
    F: for<'a> Fn(&'a T) -> Option<&'a dyn Cell> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn getter_mut<T, F>(f: F) -> GetMutFn<T>
where
    F: for<'a> Fn(&'a mut T) -> &'a mut (dyn Cell) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Address functions of a leaf field.
pub struct Accessor<T> {
    scan_type: ScanType,
    get: GetFn<T>,
    get_mut: GetMutFn<T>,
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Accessor {
            scan_type: self.scan_type.clone(),
            get: self.get.clone(),
            get_mut: self.get_mut.clone(),
        }
    }
}

impl<T> core::fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Accessor")
            .field("scan_type", &self.scan_type)
            .finish()
    }
}

impl<T: 'static> Accessor<T> {
    /// Accessor for a cell reached directly from the record.
    pub fn new<C: Cell + 'static>(get: fn(&T) -> &C, get_mut: fn(&mut T) -> &mut C) -> Accessor<T> {
        Accessor {
            scan_type: C::declared_type(),
            get: getter(move |record: &T| Some(get(record) as &dyn Cell)),
            get_mut: getter_mut(move |record: &mut T| get_mut(record) as &mut dyn Cell),
        }
    }

    /// Accessor built from arbitrary address closures.
    pub fn from_fn<G, M>(scan_type: ScanType, get: G, get_mut: M) -> Accessor<T>
    where
        G: for<'a> Fn(&'a T) -> Option<&'a dyn Cell> + Send + Sync + 'static,
        M: for<'a> Fn(&'a mut T) -> &'a mut (dyn Cell) + Send + Sync + 'static,
    {
        Accessor {
            scan_type,
            get: getter(get),
            get_mut: getter_mut(get_mut),
        }
    }

    /// Re-roots this accessor under an owner reached through `get`/`get_mut`.
    pub fn project<O: 'static>(
        self,
        get: fn(&O) -> Option<&T>,
        get_mut: fn(&mut O) -> &mut T,
    ) -> Accessor<O> {
        let inner_get = self.get;
        let inner_get_mut = self.get_mut;

        Accessor {
            scan_type: self.scan_type,
            get: getter(move |owner: &O| get(owner).and_then(|record| inner_get(record))),
            get_mut: getter_mut(move |owner: &mut O| inner_get_mut(get_mut(owner))),
        }
    }
}

impl<T> Accessor<T> {
    pub fn scan_type(&self) -> &ScanType {
        &self.scan_type
    }

    /// Cell to read from, `None` while an optional owner is absent.
    pub fn get<'a>(&self, record: &'a T) -> Option<&'a dyn Cell> {
        (self.get)(record)
    }

    /// Cell to scan into, materialising optional owners.
    pub fn get_mut<'a>(&self, record: &'a mut T) -> &'a mut dyn Cell {
        (self.get_mut)(record)
    }

    /// Reads the cell as a value; absent owners read as NULL.
    pub fn value(&self, record: &T) -> Value {
        self.get(record)
            .map(|cell| cell.to_value())
            .unwrap_or(Value::Null)
    }

    /// Scans `value` into the cell.
    pub fn set(&self, record: &mut T, value: Value) -> Result<()> {
        self.get_mut(record).set_value(value)
    }
}

/// Description of one record field.
pub struct FieldDef<T> {
    /// Rust field name
    pub name: &'static str,

    /// Parsed field tag
    pub tag: Arc<Tag>,

    pub kind: FieldKind<T>,
}

pub enum FieldKind<T> {
    /// A field holding a single cell
    Leaf(Accessor<T>),

    /// A field holding another record whose fields are projected onto the
    /// outer record
    Nested {
        /// The field is embedded (flattened) rather than namespaced
        embedded: bool,

        /// Signature of the nested record type
        type_signature: &'static str,

        fields: Vec<FieldDef<T>>,
    },
}

impl<T> core::fmt::Debug for FieldDef<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut s = f.debug_struct("FieldDef");
        s.field("name", &self.name).field("tag", &self.tag);
        match &self.kind {
            FieldKind::Leaf(accessor) => s.field("scan_type", accessor.scan_type()),
            FieldKind::Nested { fields, .. } => s.field("fields", fields),
        };
        s.finish()
    }
}

impl<T> Clone for FieldDef<T> {
    fn clone(&self) -> Self {
        FieldDef {
            name: self.name,
            tag: self.tag.clone(),
            kind: match &self.kind {
                FieldKind::Leaf(accessor) => FieldKind::Leaf(accessor.clone()),
                FieldKind::Nested {
                    embedded,
                    type_signature,
                    fields,
                } => FieldKind::Nested {
                    embedded: *embedded,
                    type_signature,
                    fields: fields.clone(),
                },
            },
        }
    }
}

impl<T: 'static> FieldDef<T> {
    /// Leaf field reached directly from the record.
    pub fn leaf<C: Cell + 'static>(
        name: &'static str,
        tag: &str,
        get: fn(&T) -> &C,
        get_mut: fn(&mut T) -> &mut C,
    ) -> Result<FieldDef<T>> {
        Ok(FieldDef {
            name,
            tag: Arc::new(Tag::parse(tag)?),
            kind: FieldKind::Leaf(Accessor::new(get, get_mut)),
        })
    }

    /// Field holding a nested record `U`.
    pub fn nested<U: Record>(
        name: &'static str,
        tag: &str,
        embedded: bool,
        get: fn(&T) -> Option<&U>,
        get_mut: fn(&mut T) -> &mut U,
    ) -> Result<FieldDef<T>> {
        let fields = U::fields()?
            .into_iter()
            .map(|field| field.project(get, get_mut))
            .collect();

        Ok(FieldDef {
            name,
            tag: Arc::new(Tag::parse(tag)?),
            kind: FieldKind::Nested {
                embedded,
                type_signature: U::type_signature(),
                fields,
            },
        })
    }

    /// Re-roots this field (and any nested fields) under an owner.
    pub fn project<O: 'static>(
        self,
        get: fn(&O) -> Option<&T>,
        get_mut: fn(&mut O) -> &mut T,
    ) -> FieldDef<O> {
        FieldDef {
            name: self.name,
            tag: self.tag,
            kind: match self.kind {
                FieldKind::Leaf(accessor) => FieldKind::Leaf(accessor.project(get, get_mut)),
                FieldKind::Nested {
                    embedded,
                    type_signature,
                    fields,
                } => FieldKind::Nested {
                    embedded,
                    type_signature,
                    fields: fields
                        .into_iter()
                        .map(|field| field.project(get, get_mut))
                        .collect(),
                },
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        self.tag.transient
    }

    pub fn accessor(&self) -> Option<&Accessor<T>> {
        match &self.kind {
            FieldKind::Leaf(accessor) => Some(accessor),
            FieldKind::Nested { .. } => None,
        }
    }

    pub fn nested_fields(&self) -> Option<&[FieldDef<T>]> {
        match &self.kind {
            FieldKind::Leaf(_) => None,
            FieldKind::Nested { fields, .. } => Some(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Inner {
        id: i64,
    }

    impl Record for Inner {
        fn fields() -> Result<Vec<FieldDef<Self>>> {
            Ok(vec![FieldDef::leaf("id", "", |r: &Inner| &r.id, |r: &mut Inner| {
                &mut r.id
            })?])
        }
    }

    #[derive(Debug, Default)]
    struct Outer {
        id: i64,
        inner: Option<Box<Inner>>,
    }

    impl Record for Outer {
        fn fields() -> Result<Vec<FieldDef<Self>>> {
            Ok(vec![
                FieldDef::leaf("id", "", |r: &Outer| &r.id, |r: &mut Outer| &mut r.id)?,
                FieldDef::nested::<Inner>(
                    "inner",
                    "ns=inner_",
                    false,
                    |r: &Outer| r.inner.as_deref(),
                    |r: &mut Outer| &mut **r.inner.get_or_insert_with(Default::default),
                )?,
            ])
        }
    }

    #[test]
    fn nested_owner_is_materialised_on_write() {
        let fields = Outer::fields().unwrap();
        let inner = fields[1].nested_fields().unwrap()[0].accessor().unwrap();

        let mut record = Outer::default();
        assert_eq!(inner.value(&record), Value::Null);

        inner.set(&mut record, Value::I64(9)).unwrap();
        assert_eq!(record.inner.as_ref().map(|i| i.id), Some(9));
        assert_eq!(inner.value(&record), Value::I64(9));
    }

    #[test]
    fn leaf_scan_type() {
        let fields = Outer::fields().unwrap();
        assert_eq!(fields[0].accessor().unwrap().scan_type(), &ScanType::I64);
        assert_eq!(fields[1].tag.ns.as_deref(), Some("inner_"));
    }
}
