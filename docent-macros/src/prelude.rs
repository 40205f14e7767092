pub(crate) use crate::utils::extract;
pub use darling::FromAttributes;
pub use heck::ToSnakeCase;
pub use itertools::Itertools;
pub use proc_macro2::{Span, TokenStream};
pub use quote::quote;
pub use syn::{
    Data, DeriveInput, Error, Field, Fields, FieldsNamed, Ident, LitStr, Result, parse2,
    spanned::Spanned,
};
