//! # Routes
//!
//! Declarative routes and includes, and the link generation that derives a
//! handler's external contract from its signature.
//!
//! ## Design Principles
//!
//! - **S**: Routes only hold declarations and their derived links
//! - **O**: New parameter kinds only need a new `TypeTag` mapping
//! - **D**: Field schemas come from `Schema::from_annotation`, not from
//!   concrete Rust types
//!
//! ## Field rules
//!
//! - A parameter named like a `{name}` or `{+name}` URL token is a path field
//!   and must have a primitive type.
//! - Primitives, the `QueryParam` marker, types carrying a field schema and
//!   containers of primitives are query fields. A query field is required
//!   only when it has no default; a null default (or an `Option` type) makes
//!   it nullable with a null default.
//! - A schema type is flattened into query fields for `GET` and `DELETE`,
//!   and is the body field otherwise. At most one body field is allowed.
//! - Anything else contributes no field.

use crate::callable::{Callable, Parameter};
use crate::docstrings;
use crate::document::{Content, Document, Field, Link, LinkResponse, Location, Section};
use crate::error::{Error, Result};
use crate::injector::Resolver;
use crate::router::Method;
use crate::schema::Schema;
use crate::types::TypeTag;
use serde_json::Value as Json;

/// A URL template bound to a handler
#[derive(Debug, Clone)]
pub struct Route {
    url: String,
    method: Method,
    handler: Callable,
    name: String,
    documented: bool,
    standalone: bool,
    tags: Vec<String>,
    link: Link,
}

impl Route {
    /// Create a route and derive its link from the handler signature
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for a malformed URL template and
    /// `Error::Configuration` for an unsupported path parameter type or
    /// conflicting body parameters.
    pub fn new(url: impl Into<String>, method: Method, handler: Callable) -> Result<Self> {
        let url = url.into();
        let name = handler.name().to_string();
        let link = generate_link(&url, method, &handler, &name, handler.parameters())?;
        Ok(Self {
            url,
            method,
            handler,
            name,
            documented: true,
            standalone: false,
            tags: Vec::new(),
            link,
        })
    }

    /// `GET` route
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn get(url: impl Into<String>, handler: Callable) -> Result<Self> {
        Self::new(url, Method::Get, handler)
    }

    /// `POST` route
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn post(url: impl Into<String>, handler: Callable) -> Result<Self> {
        Self::new(url, Method::Post, handler)
    }

    /// `PUT` route
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn put(url: impl Into<String>, handler: Callable) -> Result<Self> {
        Self::new(url, Method::Put, handler)
    }

    /// `DELETE` route
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn delete(url: impl Into<String>, handler: Callable) -> Result<Self> {
        Self::new(url, Method::Delete, handler)
    }

    /// Override the route name (defaults to the handler name)
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.link.name.clone_from(&self.name);
        self
    }

    /// Include or hide the route in the API document
    #[must_use]
    pub fn documented(mut self, documented: bool) -> Self {
        self.documented = documented;
        self
    }

    /// Run only the handler, bypassing hooks and response rendering
    #[must_use]
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    /// Extra document tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.link.tags.clone_from(&self.tags);
        self
    }

    /// Regenerate the link, including parameters validated by the components
    /// the handler depends on
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when a component parameter collides
    /// with another parameter of the same name but a different type or
    /// description, or for any link generation error.
    pub fn setup(&mut self, resolver: &Resolver) -> Result<()> {
        let extra = resolver.validation_parameters(&self.handler);
        let parameters = merge_parameters(self.handler.parameters(), extra)?;
        let mut link = generate_link(&self.url, self.method, &self.handler, &self.name, &parameters)?;
        link.tags.clone_from(&self.tags);
        self.link = link;
        Ok(())
    }

    /// URL template
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Handler callable
    #[must_use]
    pub fn handler(&self) -> &Callable {
        &self.handler
    }

    /// Route name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the route appears in the API document
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.documented
    }

    /// Whether the route bypasses the pipeline
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// Document tags
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Derived link
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }
}

crate::types::impl_named!(Route);

fn merge_parameters(own: &[Parameter], extra: Vec<Parameter>) -> Result<Vec<Parameter>> {
    let mut merged = own.to_vec();
    for parameter in extra {
        match merged.iter_mut().find(|p| p.name == parameter.name) {
            None => merged.push(parameter),
            Some(existing) => {
                let descriptions_conflict = !existing.description.is_empty()
                    && !parameter.description.is_empty()
                    && existing.description != parameter.description;
                if existing.annotation != parameter.annotation || descriptions_conflict {
                    return Err(Error::configuration(format!(
                        "Parameter \"{}\" is declared as {} and as {} with incompatible descriptions.",
                        parameter.name, existing, parameter
                    )));
                }
                if existing.description.is_empty() {
                    existing.description = parameter.description;
                }
            }
        }
    }
    Ok(merged)
}

fn generate_link(
    url: &str,
    method: Method,
    handler: &Callable,
    name: &str,
    parameters: &[Parameter],
) -> Result<Link> {
    let doc = docstrings::parse(handler.doc().unwrap_or_default());
    let described: Vec<Parameter> = parameters
        .iter()
        .map(|p| match doc.params.get(&p.name) {
            Some(text) if p.description.is_empty() => p.clone().with_description(text.clone()),
            _ => p.clone(),
        })
        .collect();
    let fields = generate_fields(url, method, &described)?;
    let encoding = fields
        .iter()
        .any(|f| f.location == Location::Body)
        .then(|| "application/json".to_string());
    Ok(Link {
        name: name.to_string(),
        method,
        url: url.to_string(),
        encoding,
        fields,
        response: generate_response(handler.returns()),
        title: doc.short_description,
        description: doc.long_description,
        tags: Vec::new(),
    })
}

/// Names of the `{name}` and `{+name}` tokens of a URL template, in order
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` for an unclosed brace, an empty
/// name or a name used twice.
pub fn path_names(url: &str) -> Result<Vec<String>> {
    let invalid = |reason: String| Error::InvalidRoutePattern {
        pattern: url.to_string(),
        reason,
    };
    let mut names: Vec<String> = Vec::new();
    let mut rest = url;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| invalid("unclosed '{'".to_string()))?;
        let token = &after[..end];
        let name = token.strip_prefix('+').unwrap_or(token);
        if name.is_empty() {
            return Err(invalid("empty parameter name".to_string()));
        }
        if names.iter().any(|n| n == name) {
            return Err(invalid(format!("parameter \"{name}\" appears more than once")));
        }
        names.push(name.to_string());
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Derive the fields of a link from the URL template and parameters
///
/// # Errors
///
/// Returns `Error::Configuration` for a path parameter without a primitive
/// type or for more than one body parameter, and
/// `Error::InvalidRoutePattern` for a malformed template.
pub fn generate_fields(url: &str, method: Method, parameters: &[Parameter]) -> Result<Vec<Field>> {
    let path_names = path_names(url)?;
    let mut fields = Vec::new();
    let mut body_names: Vec<&str> = Vec::new();

    for parameter in parameters {
        let name = parameter.name.as_str();
        if path_names.iter().any(|n| n == name) {
            let schema = parameter.annotation.primitive_schema().ok_or_else(|| {
                Error::configuration(format!(
                    "Unsupported annotation {} for path parameter \"{}\".",
                    parameter.annotation, name
                ))
            })?;
            fields.push(Field::new(name, Location::Path, true, schema).with_description(&parameter.description));
            continue;
        }

        let (inner, optional) = parameter.annotation.unwrap_optional();
        if let Some(base) = query_schema(inner) {
            let (schema, required) = apply_default(base, parameter, optional);
            fields.push(Field::new(name, Location::Query, required, schema).with_description(&parameter.description));
            continue;
        }

        let body_schema = match inner {
            TypeTag::Schema(def) if method.is_query_method() => {
                for property in def.properties().iter().filter(|p| !p.read_only) {
                    let description = property.schema.description.clone().unwrap_or_default();
                    fields.push(
                        Field::new(&property.name, Location::Query, property.required, property.schema.clone())
                            .with_description(description),
                    );
                }
                None
            }
            TypeTag::Schema(_) => Schema::from_annotation(inner),
            tag if tag.is_container() && !method.is_query_method() => Schema::from_annotation(tag),
            _ => None,
        };
        if let Some(schema) = body_schema {
            let schema = if optional { schema.nullable() } else { schema };
            body_names.push(name);
            fields.push(Field::new(name, Location::Body, !optional, schema).with_description(&parameter.description));
        }
    }

    if body_names.len() > 1 {
        let quoted: Vec<String> = body_names.iter().map(|n| format!("\"{n}\"")).collect();
        return Err(Error::configuration(format!(
            "Multiple body parameters declared: {}. At most one is allowed.",
            quoted.join(", ")
        )));
    }
    Ok(fields)
}

fn query_schema(tag: &TypeTag) -> Option<Schema> {
    match tag {
        TypeTag::QueryParam => Some(Schema::string()),
        TypeTag::Named(named) => named.schema().cloned(),
        tag if tag.is_container() && container_of_primitives(tag) => Schema::from_annotation(tag),
        tag => tag.primitive_schema(),
    }
}

fn container_of_primitives(tag: &TypeTag) -> bool {
    match tag {
        TypeTag::Sequence(inner) | TypeTag::Set(inner) | TypeTag::VarTuple(inner) => inner.is_primitive(),
        TypeTag::Tuple(items) => items.iter().all(TypeTag::is_primitive),
        _ => false,
    }
}

fn apply_default(base: Schema, parameter: &Parameter, optional: bool) -> (Schema, bool) {
    match &parameter.default {
        None if !optional => (base, true),
        None | Some(Json::Null) => (base.nullable().with_default(Json::Null), false),
        Some(default) => {
            let base = if optional { base.nullable() } else { base };
            (base.with_default(default.clone()), false)
        }
    }
}

/// Derive the declared response from a return tag
///
/// An empty or unit return is `204 No Content`. Types without a schema
/// declare no response.
#[must_use]
pub fn generate_response(returns: &TypeTag) -> Option<LinkResponse> {
    match returns {
        TypeTag::Empty | TypeTag::NoneType => Some(LinkResponse::no_content()),
        tag => Schema::from_annotation(tag).map(LinkResponse::json),
    }
}

/// Routes grouped under a URL prefix and a section name
#[derive(Debug, Clone)]
pub struct Include {
    url: String,
    name: String,
    routes: Vec<RouteItem>,
    documented: bool,
    section: Section,
}

impl Include {
    /// Group routes under `url`
    pub fn new(url: impl Into<String>, name: impl Into<String>, routes: Vec<RouteItem>) -> Self {
        let name = name.into();
        let section = generate_section(&name, &routes);
        Self {
            url: url.into(),
            name,
            routes,
            documented: true,
            section,
        }
    }

    /// Include or hide the group in the API document
    #[must_use]
    pub fn documented(mut self, documented: bool) -> Self {
        self.documented = documented;
        self
    }

    /// Set up every nested route and rebuild the section
    ///
    /// # Errors
    ///
    /// Propagates route setup errors.
    pub fn setup(&mut self, resolver: &Resolver) -> Result<()> {
        for item in &mut self.routes {
            item.setup(resolver)?;
        }
        self.section = generate_section(&self.name, &self.routes);
        Ok(())
    }

    /// URL prefix
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Section name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nested routes and includes
    #[must_use]
    pub fn routes(&self) -> &[RouteItem] {
        &self.routes
    }

    /// Whether the group appears in the API document
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.documented
    }

    /// Generated section, with nested include URLs already prefixed
    #[must_use]
    pub fn section(&self) -> &Section {
        &self.section
    }
}

fn generate_section(name: &str, routes: &[RouteItem]) -> Section {
    Section {
        name: name.to_string(),
        content: generate_content(routes),
    }
}

fn generate_content(routes: &[RouteItem]) -> Vec<Content> {
    let mut content = Vec::new();
    for item in routes {
        match item {
            RouteItem::Route(route) if route.documented => {
                content.push(Content::Link(route.link.clone()));
            }
            RouteItem::Include(include) if include.documented => {
                let mut section = include.section.clone();
                section.prefix_urls(&include.url);
                content.push(Content::Section(section));
            }
            _ => {}
        }
    }
    content
}

/// A route or an include
#[derive(Debug, Clone)]
pub enum RouteItem {
    /// A single route
    Route(Route),
    /// A group of routes
    Include(Include),
}

impl RouteItem {
    /// Set up the route or every route in the group
    ///
    /// # Errors
    ///
    /// Propagates route setup errors.
    pub fn setup(&mut self, resolver: &Resolver) -> Result<()> {
        match self {
            Self::Route(route) => route.setup(resolver),
            Self::Include(include) => include.setup(resolver),
        }
    }
}

impl From<Route> for RouteItem {
    fn from(route: Route) -> Self {
        Self::Route(route)
    }
}

impl From<Include> for RouteItem {
    fn from(include: Include) -> Self {
        Self::Include(include)
    }
}

/// Flatten routes and includes into a document
///
/// Include URLs prefix the links of their sections. Undocumented items are
/// left out.
#[must_use]
pub fn generate_document(items: &[RouteItem]) -> Document {
    Document::new(generate_content(items))
}
