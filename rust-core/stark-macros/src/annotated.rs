use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

pub fn expand(item: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(item)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::stark_core::Annotated for #ident #ty_generics #where_clause {
            fn annotation() -> ::stark_core::TypeTag {
                ::stark_core::TypeTag::named::<Self>()
            }
        }
    })
}
