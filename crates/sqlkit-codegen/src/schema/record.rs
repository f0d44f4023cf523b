use super::{ErrorSet, Field};

#[derive(Debug)]
pub(crate) struct Record {
    /// Record struct identifier
    pub(crate) ident: syn::Ident,

    /// Struct generics
    pub(crate) generics: syn::Generics,

    /// Mapped fields, in declaration order. Transient fields are omitted.
    pub(crate) fields: Vec<Field>,
}

impl Record {
    pub(crate) fn from_ast(ast: &syn::ItemStruct) -> syn::Result<Self> {
        let syn::Fields::Named(node) = &ast.fields else {
            return Err(syn::Error::new_spanned(
                &ast.fields,
                "Record derive requires a struct with named fields",
            ));
        };

        let mut errs = ErrorSet::new();
        let mut fields = vec![];

        for node in &node.named {
            match Field::from_ast(node) {
                Ok(Some(field)) => fields.push(field),
                Ok(None) => {}
                Err(err) => errs.push(err),
            }
        }

        if let Some(err) = errs.collect() {
            return Err(err);
        }

        Ok(Self {
            ident: ast.ident.clone(),
            generics: ast.generics.clone(),
            fields,
        })
    }
}
