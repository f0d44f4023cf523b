use super::ErrorSet;

use syn::parse::ParseStream;

#[derive(Debug)]
pub(crate) struct Field {
    /// Field identifier
    pub(crate) ident: syn::Ident,

    /// Raw tag string, empty when the field has no tag
    pub(crate) tag: String,

    /// How the field maps
    pub(crate) ty: FieldTy,
}

#[derive(Debug)]
pub(crate) enum FieldTy {
    /// A single cell
    Leaf(syn::Type),

    /// A nested record
    Nested {
        /// The nested record type
        target: syn::Type,

        /// How the outer record owns the nested one
        owner: Owner,

        /// Embedded with `#[sqlkit(flatten)]`
        embedded: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    /// `T`
    Value,

    /// `Box<T>`
    Boxed,

    /// `Option<T>`
    Optional,

    /// `Option<Box<T>>`
    OptionalBoxed,
}

#[derive(Debug, Default)]
struct FieldAttr {
    tag: Option<syn::LitStr>,
    flatten: bool,
}

impl Field {
    /// Parses a struct field. Returns `None` for transient fields.
    pub(super) fn from_ast(field: &syn::Field) -> syn::Result<Option<Self>> {
        let Some(ident) = &field.ident else {
            return Err(syn::Error::new_spanned(field, "record fields must be named"));
        };

        let mut errs = ErrorSet::new();
        let mut attrs = FieldAttr::default();

        for attr in &field.attrs {
            if !attr.path().is_ident("sqlkit") {
                continue;
            }

            let res = attr.parse_args_with(|input: ParseStream| {
                while !input.is_empty() {
                    if input.peek(syn::LitStr) {
                        let lit: syn::LitStr = input.parse()?;
                        if attrs.tag.is_some() {
                            errs.push(syn::Error::new_spanned(&lit, "duplicate tag"));
                        }
                        attrs.tag = Some(lit);
                    } else {
                        let word: syn::Ident = input.parse()?;
                        if word == "flatten" {
                            attrs.flatten = true;
                        } else {
                            errs.push(syn::Error::new_spanned(
                                &word,
                                "expected a tag string or `flatten`",
                            ));
                        }
                    }

                    if !input.is_empty() {
                        input.parse::<syn::Token![,]>()?;
                    }
                }
                Ok(())
            });

            if let Err(err) = res {
                errs.push(err);
            }
        }

        if let Some(err) = errs.collect() {
            return Err(err);
        }

        let tag = attrs.tag.as_ref().map(|lit| lit.value()).unwrap_or_default();
        if is_transient(&tag) {
            return Ok(None);
        }

        let ty = if attrs.flatten || is_nested(&tag) {
            let (target, owner) = owner(&field.ty);
            FieldTy::Nested {
                target,
                owner,
                embedded: attrs.flatten,
            }
        } else {
            FieldTy::Leaf(field.ty.clone())
        };

        Ok(Some(Self {
            ident: ident.clone(),
            tag,
            ty,
        }))
    }
}

fn clauses(tag: &str) -> impl Iterator<Item = (String, Option<&str>)> {
    tag.split(',').map(|clause| match clause.split_once('=') {
        Some((key, value)) => (key.trim().to_lowercase(), Some(value.trim())),
        None => (clause.trim().to_lowercase(), None),
    })
}

fn is_transient(tag: &str) -> bool {
    tag.trim() == "-"
        || clauses(tag).any(|(key, value)| {
            key == "transient" && !matches!(value, Some(v) if v.eq_ignore_ascii_case("false"))
        })
}

/// Namespaced and presence fields hold nested records.
fn is_nested(tag: &str) -> bool {
    clauses(tag).any(|(key, value)| {
        key == "ns" || (key == "presence" && !matches!(value, Some(v) if v.eq_ignore_ascii_case("false")))
    })
}

/// Splits `Option<Box<T>>` and friends into `T` and the owner shape.
fn owner(ty: &syn::Type) -> (syn::Type, Owner) {
    match single_generic(ty, "Option") {
        Some(inner) => match single_generic(inner, "Box") {
            Some(target) => (target.clone(), Owner::OptionalBoxed),
            None => (inner.clone(), Owner::Optional),
        },
        None => match single_generic(ty, "Box") {
            Some(target) => (target.clone(), Owner::Boxed),
            None => (ty.clone(), Owner::Value),
        },
    }
}

fn single_generic<'a>(ty: &'a syn::Type, name: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(ty) if args.args.len() == 1 => Some(ty),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> syn::Field {
        let item: syn::ItemStruct = syn::parse_str(&format!("struct S {{ {src} }}")).unwrap();
        item.fields.into_iter().next().unwrap()
    }

    #[test]
    fn leaf_field() {
        let field = Field::from_ast(&parse(r#"#[sqlkit("id,primaryKey")] id: i64"#))
            .unwrap()
            .unwrap();
        assert_eq!(field.tag, "id,primaryKey");
        assert!(matches!(field.ty, FieldTy::Leaf(_)));
    }

    #[test]
    fn transient_field_is_skipped() {
        assert!(Field::from_ast(&parse(r#"#[sqlkit("-")] cache: Vec<u8>"#))
            .unwrap()
            .is_none());
    }

    #[test]
    fn namespaced_owner() {
        let field = Field::from_ast(&parse(r#"#[sqlkit("ns=z_")] z: Option<Box<Z>>"#))
            .unwrap()
            .unwrap();
        let FieldTy::Nested { owner, embedded, .. } = field.ty else {
            panic!("expected nested field");
        };
        assert_eq!(owner, Owner::OptionalBoxed);
        assert!(!embedded);
    }

    #[test]
    fn flatten() {
        let field = Field::from_ast(&parse(r#"#[sqlkit(flatten)] base: Base"#))
            .unwrap()
            .unwrap();
        assert!(matches!(
            field.ty,
            FieldTy::Nested {
                owner: Owner::Value,
                embedded: true,
                ..
            }
        ));
    }

    #[test]
    fn unknown_word() {
        assert!(Field::from_ast(&parse(r#"#[sqlkit(nope)] id: i64"#)).is_err());
    }
}
