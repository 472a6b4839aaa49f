mod condition;
mod shared;
mod sum;

use proc_macro::TokenStream;

/// Derives `krino::walk::ToShape` for a struct with named fields.
///
/// Fields are compiled under their own names (`gt_age`, `like_name`, ...).
/// `#[krino(rename = "...")]` changes the name, `#[krino(skip)]` leaves the
/// field out. `Option` fields that are `None` produce no filter.
#[proc_macro_derive(Condition, attributes(krino))]
pub fn derive_condition(input: TokenStream) -> TokenStream {
    condition::derive(input)
}

/// Derives `krino::SumFields`: every named field is a column to sum.
///
/// The struct must also implement `Deserialize`; the sum row is decoded into it.
#[proc_macro_derive(SumFields, attributes(krino))]
pub fn derive_sum_fields(input: TokenStream) -> TokenStream {
    sum::derive(input)
}
