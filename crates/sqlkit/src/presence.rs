use crate::field::{Field, Fields};

use sqlkit_core::{record::Accessor, Error, Record, Result, Value};

/// Presence marker of a record type.
///
/// A record declares a nested `presence` field holding one `bool` per data
/// field. A flag set to `true` marks the field as explicitly set. Fields
/// without a flag, and every field of a record whose marker is absent, count
/// as set.
pub struct Presence<T> {
    /// Flag accessor per data field position
    flags: Vec<Option<Accessor<T>>>,
}

impl<T> core::fmt::Debug for Presence<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let flagged: Vec<_> = self
            .flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| flag.is_some())
            .map(|(i, _)| i)
            .collect();
        f.debug_struct("Presence").field("flagged", &flagged).finish()
    }
}

impl<T> Clone for Presence<T> {
    fn clone(&self) -> Self {
        Presence {
            flags: self.flags.clone(),
        }
    }
}

impl<T: Record> Presence<T> {
    /// Presence marker of `T`, or `None` when `T` declares none.
    pub fn of() -> Result<Option<Presence<T>>> {
        Presence::from_fields(&Fields::<T>::of()?)
    }
}

impl<T: 'static> Presence<T> {
    /// Presence marker described by already walked fields.
    pub fn from_fields(fields: &Fields<T>) -> Result<Option<Presence<T>>> {
        match &fields.presence {
            Some(marker) => Presence::new(&fields.data, marker, &fields.transient).map(Some),
            None => Ok(None),
        }
    }

    /// Pairs each marker flag with the data field of the same name. Flags
    /// naming a transient field are accepted and never consulted.
    pub fn new(data: &[Field<T>], marker: &[Field<T>], transient: &[&str]) -> Result<Presence<T>> {
        let mut flags = vec![None; data.len()];

        for flag in marker {
            match data.iter().position(|field| same_name(field, flag)) {
                Some(position) => flags[position] = Some(flag.accessor.clone()),
                None if names_transient(transient, flag) => {
                    tracing::trace!(flag = flag.name, "presence flag names a transient field");
                }
                None => {
                    return Err(Error::configuration(format!(
                        "failed to match presence field {}",
                        flag.name
                    )))
                }
            }
        }

        Ok(Presence { flags })
    }

    /// Returns `true` when the data field at `position` was explicitly set.
    pub fn is_field_set(&self, record: &T, position: usize) -> bool {
        let Some(Some(flag)) = self.flags.get(position) else {
            return true;
        };

        match flag.get(record) {
            Some(cell) => !cell.is_zero(),
            None => true,
        }
    }

    /// Marks the data field at `position`.
    pub fn set(&self, record: &mut T, position: usize, set: bool) -> Result<()> {
        match self.flags.get(position) {
            Some(Some(flag)) => flag.set(record, Value::Bool(set)),
            _ => Ok(()),
        }
    }

    /// Drops the entries of `values` whose data field is not set. `values`
    /// holds one entry per position in `positions`.
    pub fn filter<V>(&self, record: &T, positions: &[usize], values: Vec<V>) -> Vec<V> {
        positions
            .iter()
            .zip(values)
            .filter(|(position, _)| self.is_field_set(record, **position))
            .map(|(_, value)| value)
            .collect()
    }
}

fn fuzzy(name: &str) -> String {
    name.to_lowercase().replace('_', "")
}

fn flag_name<T>(flag: &Field<T>) -> String {
    fuzzy(flag.tag.column_name().unwrap_or(flag.name))
}

fn same_name<T>(field: &Field<T>, flag: &Field<T>) -> bool {
    let flag_name = flag_name(flag);
    fuzzy(field.name) == flag_name || fuzzy(&field.column_name()) == flag_name
}

fn names_transient<T>(transient: &[&str], flag: &Field<T>) -> bool {
    let flag_name = flag_name(flag);
    transient.iter().any(|name| fuzzy(name) == flag_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, sqlkit::Record)]
    struct FooHas {
        name: bool,
        quantity: bool,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Foo {
        #[sqlkit("id,primaryKey")]
        id: i64,
        name: String,
        quantity: i32,
        #[sqlkit("presence")]
        has: Option<FooHas>,
    }

    #[test]
    fn absent_marker_means_every_field_is_set() {
        let presence = Presence::<Foo>::of().unwrap().unwrap();
        let foo = Foo::default();
        for i in 0..3 {
            assert!(presence.is_field_set(&foo, i));
        }
    }

    #[test]
    fn flags_gate_fields() {
        let presence = Presence::<Foo>::of().unwrap().unwrap();
        let mut foo = Foo::default();
        presence.set(&mut foo, 1, true).unwrap();

        assert!(presence.is_field_set(&foo, 0));
        assert!(presence.is_field_set(&foo, 1));
        assert!(!presence.is_field_set(&foo, 2));

        let kept = presence.filter(&foo, &[0, 1, 2], vec!["id", "name", "quantity"]);
        assert_eq!(kept, ["id", "name"]);
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct BadHas {
        missing: bool,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Bad {
        id: i64,
        #[sqlkit("presence")]
        has: Option<BadHas>,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct DraftHas {
        name: bool,
        scratch: bool,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Draft {
        #[sqlkit("id,primaryKey")]
        id: i64,
        name: String,
        #[sqlkit("-")]
        scratch: String,
        #[sqlkit("presence")]
        has: Option<DraftHas>,
    }

    #[test]
    fn flag_for_transient_field_is_inert() {
        let presence = Presence::<Draft>::of().unwrap().unwrap();
        let mut draft = Draft::default();
        presence.set(&mut draft, 1, true).unwrap();
        assert!(presence.is_field_set(&draft, 0));
        assert!(presence.is_field_set(&draft, 1));
        assert!(draft.has.as_ref().is_some_and(|has| has.name && !has.scratch));
    }

    #[test]
    fn unmatched_flag_is_a_configuration_error() {
        let err = Presence::<Bad>::of().unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "failed to match presence field missing");
    }
}
