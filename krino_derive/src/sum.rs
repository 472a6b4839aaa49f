use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

use crate::shared::{import_krino, named_fields};

pub fn derive(input: TokenStream) -> TokenStream {
    let krino = import_krino();
    let input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;

    let fields = match named_fields(&input, "SumFields") {
        Ok(fields) => fields,
        Err(e) => return e.to_compile_error().into(),
    };
    let names = fields.iter().map(|f| f.name.as_str());

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #krino::SumFields for #ident #ty_generics #where_clause {
            const FIELDS: &'static [&'static str] = &[#(#names),*];
        }
    };

    TokenStream::from(expanded)
}
