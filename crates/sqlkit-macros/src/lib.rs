extern crate proc_macro;

use proc_macro::TokenStream;

/// Derives `sqlkit::Record` for a struct with named fields.
///
/// Fields take an optional `#[sqlkit("...")]` tag (see `sqlkit::Tag`) or
/// `#[sqlkit(flatten)]` to embed a nested record without a namespace.
#[proc_macro_derive(Record, attributes(sqlkit))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    match sqlkit_codegen::generate(input.into()) {
        Ok(output) => output.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
