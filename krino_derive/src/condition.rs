use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

use crate::shared::{import_krino, named_fields};

/// `impl ToShape` listing every field under its query name. Nested condition
/// structs and maps stay nested in the shape; the walker flattens them.
pub fn derive(input: TokenStream) -> TokenStream {
    let krino = import_krino();
    let input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;

    let fields = match named_fields(&input, "Condition") {
        Ok(fields) => fields,
        Err(e) => return e.to_compile_error().into(),
    };

    let entries = fields.iter().map(|f| {
        let name = f.name.as_str();
        let member = &f.field.ident;
        quote! {
            (#name, #krino::walk::ToShape::to_shape(&self.#member))
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #krino::walk::ToShape for #ident #ty_generics #where_clause {
            fn to_shape(&self) -> #krino::walk::Shape {
                #krino::walk::Shape::Struct(::std::vec![
                    #(#entries,)*
                ])
            }
        }
    };

    TokenStream::from(expanded)
}
