use crate::schema::{Field, FieldTy, Owner, Record};

use proc_macro2::TokenStream;
use quote::quote;

struct Expand<'a> {
    /// The record being expanded
    record: &'a Record,

    /// Path prefix for sqlkit types
    sqlkit: TokenStream,
}

impl Expand<'_> {
    fn expand(&self) -> TokenStream {
        let sqlkit = &self.sqlkit;
        let ident = &self.record.ident;
        let (impl_generics, ty_generics, where_clause) = self.record.generics.split_for_impl();
        let fields = self.record.fields.iter().map(|field| self.expand_field(field));

        wrap_in_const(quote! {
            impl #impl_generics #sqlkit::Record for #ident #ty_generics #where_clause {
                fn fields() -> #sqlkit::Result<Vec<#sqlkit::FieldDef<Self>>> {
                    Ok(vec![
                        #( #fields, )*
                    ])
                }
            }
        })
    }

    fn expand_field(&self, field: &Field) -> TokenStream {
        let sqlkit = &self.sqlkit;
        let ident = &field.ident;
        let name = ident.to_string();
        let tag = &field.tag;

        match &field.ty {
            FieldTy::Leaf(ty) => quote! {
                #sqlkit::FieldDef::leaf::<#ty>(
                    #name,
                    #tag,
                    |record: &Self| &record.#ident,
                    |record: &mut Self| &mut record.#ident,
                )?
            },
            FieldTy::Nested {
                target,
                owner,
                embedded,
            } => {
                let (get, get_mut) = match owner {
                    Owner::Value => (
                        quote!(Some(&record.#ident)),
                        quote!(&mut record.#ident),
                    ),
                    Owner::Boxed => (
                        quote!(Some(&*record.#ident)),
                        quote!(&mut *record.#ident),
                    ),
                    Owner::Optional => (
                        quote!(record.#ident.as_ref()),
                        quote!(record.#ident.get_or_insert_with(Default::default)),
                    ),
                    Owner::OptionalBoxed => (
                        quote!(record.#ident.as_deref()),
                        quote!(&mut **record.#ident.get_or_insert_with(Default::default)),
                    ),
                };

                quote! {
                    #sqlkit::FieldDef::nested::<#target>(
                        #name,
                        #tag,
                        #embedded,
                        |record: &Self| #get,
                        |record: &mut Self| #get_mut,
                    )?
                }
            }
        }
    }
}

pub(super) fn record(record: &Record) -> TokenStream {
    Expand {
        record,
        sqlkit: quote!(_sqlkit::codegen_support),
    }
    .expand()
}

fn wrap_in_const(code: TokenStream) -> TokenStream {
    quote! {
        const _: () = {
            use sqlkit as _sqlkit;
            #code
        };
    }
}
