//! # Stark Macros
//!
//! Procedural macros for Stark handlers and schema types.
//!
//! - `#[handler]` turns a free function into a [`Callable`] factory
//! - `#[derive(SchemaType)]` declares a reusable object schema
//! - `#[derive(Annotated)]` gives any type a nominal type tag
//!
//! Generated code refers to `::stark_core`, which re-exports these macros.
//!
//! [`Callable`]: https://docs.rs/stark-core/latest/stark_core/struct.Callable.html

use proc_macro::TokenStream;

mod annotated;
mod handler;
mod schema;

/// Generate a `<name>_callable()` factory for a free function
///
/// Parameters are extracted by name with their `Annotated` type tag, doc
/// comments become the callable's doc string, and a `Result` return is
/// propagated with `?`.
///
/// ```ignore
/// /// Look up a user.
/// ///
/// /// :param user_id: Database id of the user
/// #[handler]
/// fn get_user(user_id: i64, #[default(false)] verbose: bool) -> Result<User> {
///     // ...
/// }
///
/// let route = Route::get("/users/{user_id}/", get_user_callable())?;
/// ```
///
/// `#[handler(name = "lookup")]` overrides the callable name.
#[proc_macro_attribute]
pub fn handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::expand(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `SchemaType` and a schema-tagged `Annotated`
///
/// The type must also implement `Clone`, `Serialize` and `Deserialize`.
/// Field attributes: `#[schema(read_only)]`. Container attributes:
/// `#[schema(strict)]` rejects unknown properties.
#[proc_macro_derive(SchemaType, attributes(schema))]
pub fn derive_schema_type(item: TokenStream) -> TokenStream {
    schema::expand(item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive a nominal `Annotated` impl
#[proc_macro_derive(Annotated)]
pub fn derive_annotated(item: TokenStream) -> TokenStream {
    annotated::expand(item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Joined `///` doc comment lines
fn doc_string(attrs: &[syn::Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s), ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(&line).to_string())
        .collect();
    lines.join("\n").trim().to_string()
}
