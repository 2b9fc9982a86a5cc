use crate::doc_string;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, GenericArgument, ItemFn, LitStr, Pat, PathArguments, ReturnType, Type};

struct HandlerArgs {
    name: Option<String>,
}

fn parse_args(attr: TokenStream) -> syn::Result<HandlerArgs> {
    let mut args = HandlerArgs { name: None };
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            let value: LitStr = meta.value()?.parse()?;
            args.name = Some(value.value());
            Ok(())
        } else {
            Err(meta.error("unknown handler option, expected `name`"))
        }
    });
    syn::parse::Parser::parse2(parser, attr)?;
    Ok(args)
}

struct Param {
    ident: syn::Ident,
    ty: Type,
    default: Option<syn::Expr>,
}

fn collect_params(func: &mut ItemFn) -> syn::Result<Vec<Param>> {
    let mut params = Vec::new();
    for input in &mut func.sig.inputs {
        let typed = match input {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "handlers must be free functions",
                ))
            }
            FnArg::Typed(typed) => typed,
        };
        let Pat::Ident(pat) = typed.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &typed.pat,
                "handler parameters must be plain identifiers",
            ));
        };
        if matches!(typed.ty.as_ref(), Type::Reference(_)) {
            return Err(syn::Error::new_spanned(
                &typed.ty,
                "handler parameters must be owned; use Arc<T> to share",
            ));
        }

        let mut default = None;
        let mut kept = Vec::with_capacity(typed.attrs.len());
        for attr in typed.attrs.drain(..) {
            if attr.path().is_ident("default") {
                default = Some(attr.parse_args::<syn::Expr>()?);
            } else {
                kept.push(attr);
            }
        }
        typed.attrs = kept;

        params.push(Param {
            ident: pat.ident.clone(),
            ty: typed.ty.as_ref().clone(),
            default,
        });
    }
    Ok(params)
}

/// `T` for a return type spelled `Result<T>` or `Result<T, E>`
fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(ok) => Some(ok),
        _ => None,
    }
}

pub fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = parse_args(attr)?;
    let mut func: ItemFn = syn::parse2(item)?;
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "handlers cannot be generic",
        ));
    }

    let params = collect_params(&mut func)?;
    let fn_ident = func.sig.ident.clone();
    let factory = format_ident!("{}_callable", fn_ident);
    let vis = &func.vis;
    let name = args.name.unwrap_or_else(|| fn_ident.to_string());
    let doc = doc_string(&func.attrs);
    let is_async = func.sig.asyncness.is_some();

    let declarations = params.iter().map(|param| {
        let ident = param.ident.to_string();
        let ty = &param.ty;
        let tag = quote! { <#ty as ::stark_core::Annotated>::annotation() };
        match &param.default {
            Some(default) => quote! {
                .parameter(
                    ::stark_core::Parameter::new(#ident, #tag)
                        .with_default(::stark_core::__private::serde_json::json!(#default))
                )
            },
            None => quote! { .parameter(::stark_core::Parameter::new(#ident, #tag)) },
        }
    });

    let extractions = params.iter().map(|param| {
        let ident = &param.ident;
        let key = ident.to_string();
        let ty = &param.ty;
        quote! { let #ident: #ty = args.get(#key)?; }
    });
    let call_args = params.iter().map(|param| &param.ident);

    let call = if is_async {
        quote! { #fn_ident(#(#call_args),*).await }
    } else {
        quote! { #fn_ident(#(#call_args),*) }
    };
    let (returns, finish) = match &func.sig.output {
        ReturnType::Default => (
            quote! {},
            quote! {
                #call;
                ::std::result::Result::Ok(::stark_core::Value::none())
            },
        ),
        ReturnType::Type(_, ty) => {
            let (ok, call) = match result_ok_type(ty) {
                Some(ok) => (ok, quote! { #call? }),
                None => (ty.as_ref(), call),
            };
            (
                quote! { .returns_tag(<#ok as ::stark_core::Annotated>::annotation()) },
                quote! {
                    let output: #ok = #call;
                    ::std::result::Result::Ok(::stark_core::Value::new(output))
                },
            )
        }
    };

    let body = if is_async {
        quote! {
            .asynchronous(|args: ::stark_core::Args| async move {
                #(#extractions)*
                #finish
            })
        }
    } else {
        quote! {
            .sync(|args: ::stark_core::Args| {
                #(#extractions)*
                #finish
            })
        }
    };

    let doc_call = if doc.is_empty() {
        quote! {}
    } else {
        quote! { .doc(#doc) }
    };
    let factory_doc = format!("Callable for [`{fn_ident}`]");

    Ok(quote! {
        #func

        #[doc = #factory_doc]
        #vis fn #factory() -> ::stark_core::Callable {
            ::stark_core::Callable::builder(#name)
                #doc_call
                #(#declarations)*
                #returns
                #body
        }
    })
}
