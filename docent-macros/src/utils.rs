use crate::prelude::*;
use proc_macro_crate::{FoundCrate, crate_name};

macro_rules! extract {
    ($val:expr, $pat:pat, $error_message: expr) => {
        let $pat = $val else {
            return Err(Error::new_spanned($val, $error_message));
        };
    };
}

pub(crate) use extract;

pub fn extract_named_fields(span: Span, data: Data) -> Result<FieldsNamed> {
    let Data::Struct(data_struct) = data else {
        return Err(Error::new(span, "expected struct"));
    };

    extract!(
        data_struct.fields,
        Fields::Named(named_fields),
        "expected named fields"
    );

    Ok(named_fields)
}

pub fn extract_serde_rename(field: &Field) -> Option<String> {
    #[derive(FromAttributes)]
    #[darling(attributes(serde))]
    struct SerdeAttribute {
        rename: String,
    }

    let serde_attribute = SerdeAttribute::from_attributes(&field.attrs).ok();

    serde_attribute.map(|attribute| attribute.rename)
}

pub fn krate() -> TokenStream {
    match crate_name("docent") {
        // `Itself` is also reported for the library's own integration
        // tests, where the path must still be `::docent`.
        Ok(FoundCrate::Itself) if compiling_docent_itself() => quote! { crate },
        Ok(FoundCrate::Itself) | Err(_) => quote! { ::docent },
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote! { ::#ident }
        }
    }
}

pub fn mongodb() -> TokenStream {
    let krate = krate();

    if krate.to_string() == "crate" {
        quote! { ::mongodb }
    } else {
        quote! { #krate::mongodb }
    }
}

fn compiling_docent_itself() -> bool {
    std::env::var("CARGO_CRATE_NAME").as_deref() == Ok("docent")
}
