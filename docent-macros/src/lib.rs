#[warn(clippy::pedantic)]
#[allow(clippy::too_many_lines)]
mod derive_domain;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(DomainModel, attributes(domain))]
pub fn domain_model(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(derive_domain::derive_domain, input)
}
