use crate::{
    prelude::*,
    utils::{extract_named_fields, extract_serde_rename, krate, mongodb},
};

#[derive(FromAttributes, Default)]
#[darling(attributes(domain))]
struct Attributes {
    #[darling(default)]
    collection: Option<String>,
    #[darling(default)]
    model: Option<String>,
}

#[derive(FromAttributes, Default)]
#[darling(attributes(domain))]
struct FieldAttributes {
    #[darling(default)]
    reference: Option<String>,
}

pub fn derive_domain(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    let attributes = Attributes::from_attributes(&input.attrs)?;

    let fields = {
        let fields_named = extract_named_fields(input.span(), input.data)?;

        let fields_span = fields_named.span();

        let mut has_id = false;
        let mut fields = vec![];

        for field in fields_named.named {
            let rename = extract_serde_rename(&field);
            let field_attributes = FieldAttributes::from_attributes(&field.attrs)?;

            let Some(ident) = field.ident else {
                return Err(Error::new(fields_span, "expected named fields"));
            };

            if ident == "id" {
                let missing_serde_attribute_err = || {
                    Error::new_spanned(&ident, "id field must have `#[serde(rename = \"_id\")]`")
                };

                let Some(rename) = &rename else {
                    return Err(missing_serde_attribute_err());
                };

                if rename != "_id" {
                    return Err(missing_serde_attribute_err());
                }

                has_id = true;
            }

            fields.push(FieldConfig {
                ident,
                rename,
                reference: field_attributes.reference,
            });
        }

        if !has_id {
            return Err(Error::new(fields_span, "an entity must have an `id` field"));
        }

        fields
    };

    let output = build(&input.ident, &attributes, &fields);

    Ok(output)
}

struct FieldConfig {
    ident: Ident,
    rename: Option<String>,
    reference: Option<String>,
}

impl FieldConfig {
    fn serialized_name(&self) -> String {
        self.rename
            .clone()
            .unwrap_or_else(|| self.ident.to_string())
    }
}

fn build(ident: &Ident, attributes: &Attributes, fields: &[FieldConfig]) -> TokenStream {
    let krate = krate();
    let mongodb = mongodb();

    let model_name = attributes
        .model
        .clone()
        .unwrap_or_else(|| ident.to_string());
    let model_lit = LitStr::new(&model_name, Span::call_site());

    let collection_name = attributes.collection.clone().unwrap_or_else(|| {
        let snake_case_entity = ident.to_string().to_snake_case();
        snake_case_entity
            .strip_suffix("_entity")
            .unwrap_or(&snake_case_entity)
            .to_owned()
    });
    let collection_lit = LitStr::new(&collection_name, Span::call_site());

    let field_lits = fields
        .iter()
        .map(|field| LitStr::new(&field.serialized_name(), Span::call_site()))
        .collect_vec();

    let field_refs = fields
        .iter()
        .map(|field| match &field.reference {
            Some(target) => {
                let target_lit = LitStr::new(target, Span::call_site());
                quote! { ::std::option::Option::Some(#target_lit) }
            }
            None => quote! { ::std::option::Option::None },
        })
        .collect_vec();

    let relations = fields
        .iter()
        .filter(|field| field.reference.is_some())
        .collect_vec();

    let relation_idents = relations.iter().map(|field| &field.ident).collect_vec();

    let relation_lits = relations
        .iter()
        .map(|field| LitStr::new(&field.serialized_name(), Span::call_site()))
        .collect_vec();

    quote! {
        impl #krate::DomainModel for #ident {
            const MODEL_NAME: &'static str = #model_lit;

            const COLLECTION_NAME: &'static str = #collection_lit;

            fn schema() -> #krate::Schema {
                #krate::Schema {
                    model: Self::MODEL_NAME,
                    collection: Self::COLLECTION_NAME,
                    fields: ::std::vec![
                        #(
                            #krate::FieldSpec {
                                name: #field_lits,
                                reference: #field_refs,
                            }
                        ),*
                    ],
                }
            }

            fn id(&self) -> #mongodb::bson::oid::ObjectId {
                self.id
            }

            fn relation_state(&self, field: &str) -> ::std::option::Option<#krate::RelationState> {
                match field {
                    #(
                        #relation_lits => ::std::option::Option::Some(
                            #krate::Relation::state(&self.#relation_idents),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_relation(
                &mut self,
                field: &str,
                value: #mongodb::bson::Bson,
            ) -> #krate::Result<()> {
                match field {
                    #(
                        #relation_lits => {
                            self.#relation_idents = #krate::Relation::from_bson(value)?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err(#krate::Error::validation(
                        ::std::format!(
                            "`{field}` is not a relation field of `{}`",
                            Self::COLLECTION_NAME,
                        ),
                    )),
                }
            }

            fn populate_nested<'a>(
                &'a mut self,
                field: &'a str,
                context: &'a ::std::sync::Arc<#krate::DataContext>,
                spec: &'a #krate::PathSpec,
            ) -> #krate::BoxFuture<'a, #krate::Result<()>> {
                match field {
                    #(
                        #relation_lits => #krate::Relation::populate_nested(
                            &mut self.#relation_idents,
                            context,
                            spec,
                        ),
                    )*
                    _ => ::std::boxed::Box::pin(::std::future::ready(
                        ::std::result::Result::Err(#krate::Error::validation(
                            ::std::format!(
                                "`{field}` is not a relation field of `{}`",
                                Self::COLLECTION_NAME,
                            ),
                        )),
                    )),
                }
            }
        }
    }
}
