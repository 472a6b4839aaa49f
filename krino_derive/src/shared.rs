use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{
    Data, DeriveInput, Error, Expr, ExprLit, Field, Fields, Lit, Meta, Result, ext::IdentExt,
    punctuated::Punctuated,
};

pub fn import_krino() -> proc_macro2::TokenStream {
    // This finds the krino crate in the user's dependencies
    let found_crate = crate_name("krino").unwrap_or(FoundCrate::Itself);

    match found_crate {
        FoundCrate::Itself => quote! { ::krino },
        FoundCrate::Name(name) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote! { ::#ident }
        }
    }
}

/// Options from `#[krino(...)]` on a single field.
#[derive(Debug, Default)]
pub struct FieldAttr {
    pub rename: Option<String>,
    pub skip: bool,
}

impl FieldAttr {
    pub fn from_field(field: &Field) -> Result<Self> {
        let mut out = FieldAttr::default();

        for attr in &field.attrs {
            if !attr.path().is_ident("krino") {
                continue;
            }

            let Meta::List(meta_list) = &attr.meta else {
                return Err(Error::new_spanned(attr, "expected #[krino(...)]"));
            };
            let nested = meta_list
                .parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)
                .map_err(|e| {
                    Error::new_spanned(attr, format!("Failed to parse krino attributes: {}", e))
                })?;

            for meta in nested {
                match meta {
                    Meta::Path(path) if path.is_ident("skip") => out.skip = true,
                    Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                        let Expr::Lit(ExprLit {
                            lit: Lit::Str(s), ..
                        }) = &nv.value
                        else {
                            return Err(Error::new_spanned(
                                &nv.value,
                                "rename must be a string literal",
                            ));
                        };
                        out.rename = Some(s.value());
                    }
                    other => {
                        return Err(Error::new_spanned(
                            other,
                            "unknown krino attribute, expected `rename = \"...\"` or `skip`",
                        ));
                    }
                }
            }
        }

        Ok(out)
    }
}

/// A named field that takes part in the generated impl.
pub struct NamedField<'a> {
    pub field: &'a Field,
    /// The name the field is known by in queries.
    pub name: String,
}

/// Named, non-skipped fields of a struct, in declaration order.
pub fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<Vec<NamedField<'a>>> {
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    format!("{} only supports named structs", derive),
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                format!("{} only supports structs", derive),
            ));
        }
    };

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let attr = FieldAttr::from_field(field)?;
        if attr.skip {
            continue;
        }
        let name = match attr.rename {
            Some(name) => name,
            None => match &field.ident {
                Some(ident) => ident.unraw().to_string(),
                None => continue,
            },
        };
        out.push(NamedField { field, name });
    }
    Ok(out)
}
