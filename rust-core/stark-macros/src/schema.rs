use crate::doc_string;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields};

#[derive(Default)]
struct ContainerOptions {
    strict: bool,
}

fn container_options(input: &DeriveInput) -> syn::Result<ContainerOptions> {
    let mut options = ContainerOptions::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("schema")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("strict") {
                options.strict = true;
                Ok(())
            } else {
                Err(meta.error("unknown schema option, expected `strict`"))
            }
        })?;
    }
    Ok(options)
}

fn is_read_only(field: &syn::Field) -> syn::Result<bool> {
    let mut read_only = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("schema")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("read_only") {
                read_only = true;
                Ok(())
            } else {
                Err(meta.error("unknown schema field option, expected `read_only`"))
            }
        })?;
    }
    Ok(read_only)
}

pub fn expand(item: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(item)?;
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "SchemaType cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(ident, "SchemaType requires a struct"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            ident,
            "SchemaType requires a struct with named fields",
        ));
    };

    let options = container_options(&input)?;
    let name = ident.to_string();
    let description = doc_string(&input.attrs);

    let mut steps = Vec::new();
    if !description.is_empty() {
        steps.push(quote! { .description(#description) });
    }
    for field in &fields.named {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let field_name = field_ident.to_string();
        let ty = &field.ty;
        let tag = quote! { &<#ty as ::stark_core::Annotated>::annotation() };
        if is_read_only(field)? {
            steps.push(quote! { .read_only_field(#field_name, #tag) });
        } else {
            steps.push(quote! { .field(#field_name, #tag) });
        }
    }
    if options.strict {
        steps.push(quote! { .strict() });
    }

    Ok(quote! {
        impl ::stark_core::SchemaType for #ident {
            fn schema_def() -> ::stark_core::SchemaDef {
                static DEF: ::std::sync::OnceLock<::stark_core::SchemaDef> = ::std::sync::OnceLock::new();
                DEF.get_or_init(|| {
                    ::stark_core::SchemaDef::builder(#name)
                        #(#steps)*
                        .build()
                })
                .clone()
            }
        }

        impl ::stark_core::Annotated for #ident {
            fn annotation() -> ::stark_core::TypeTag {
                ::stark_core::TypeTag::Schema(<Self as ::stark_core::SchemaType>::schema_def())
            }

            fn from_json(json: &::stark_core::__private::serde_json::Value) -> ::std::option::Option<Self> {
                ::stark_core::__private::serde_json::from_value(json.clone()).ok()
            }

            fn to_json(&self) -> ::std::option::Option<::stark_core::__private::serde_json::Value> {
                ::stark_core::__private::serde_json::to_value(self).ok()
            }
        }
    })
}
