//! # Document Codecs
//!
//! Encode a [`Document`] as an API description.
//!
//! Both formats share the same walk: one operation per link, keyed by path
//! then lower-case method, tagged with the outermost enclosing section.
//! Schema types referenced anywhere end up in a shared definitions table.

mod openapi;
mod swagger;

pub use openapi::OpenApiCodec;
pub use swagger::SwaggerCodec;

use crate::document::{Document, Field, Link, Section};
use crate::error::Result;
use crate::schema::SchemaDef;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// An API description format
pub trait DocumentCodec {
    /// Media type of the encoded document
    fn media_type(&self) -> &'static str;

    /// Encode as a JSON value
    fn encode(&self, document: &Document) -> Json;

    /// Encode as pretty-printed UTF-8 JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    fn encode_bytes(&self, document: &Document) -> Result<Vec<u8>> {
        crate::json::to_json_pretty(&self.encode(document)).map(String::into_bytes)
    }
}

/// Schema types collected while encoding, keyed by name
pub(crate) type Definitions = BTreeMap<String, SchemaDef>;

/// Build the `paths` object, one operation per documented link
pub(crate) fn paths<F>(document: &Document, defs: &mut Definitions, mut operation: F) -> Json
where
    F: FnMut(&Link, Vec<String>, &mut Definitions) -> Json,
{
    let mut paths = Map::new();
    for (link, sections) in document.walk_links() {
        let path = paths
            .entry(path_of(&link.url).to_string())
            .or_insert_with(|| Json::Object(Map::new()));
        let op = operation(link, tags(link, &sections), defs);
        if let Json::Object(methods) = path {
            methods.insert(link.method.as_str().to_ascii_lowercase(), op);
        }
    }
    Json::Object(paths)
}

/// Operation fields common to both formats
pub(crate) fn operation_base(link: &Link, tags: Vec<String>) -> Map<String, Json> {
    let mut op = Map::new();
    op.insert("operationId".to_string(), Json::from(link.name.clone()));
    if !link.title.is_empty() {
        op.insert("summary".to_string(), Json::from(link.title.clone()));
    }
    if !link.description.is_empty() {
        op.insert("description".to_string(), Json::from(link.description.clone()));
    }
    if !tags.is_empty() {
        op.insert("tags".to_string(), Json::from(tags));
    }
    op
}

/// A path or query parameter object, name and location first
pub(crate) fn parameter_base(field: &Field) -> Map<String, Json> {
    let mut parameter = Map::new();
    parameter.insert("name".to_string(), Json::from(field.name.clone()));
    parameter.insert("in".to_string(), Json::from(field.location.as_str()));
    if field.required {
        parameter.insert("required".to_string(), Json::Bool(true));
    }
    if !field.description.is_empty() {
        parameter.insert("description".to_string(), Json::from(field.description.clone()));
    }
    parameter
}

/// Render every collected definition, including ones referenced by
/// definitions rendered along the way
pub(crate) fn render_definitions(defs: &mut Definitions, ref_prefix: &str) -> Map<String, Json> {
    let mut rendered = Map::new();
    loop {
        let pending: Vec<SchemaDef> = defs
            .values()
            .filter(|def| !rendered.contains_key(def.name()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return rendered;
        }
        for def in pending {
            let schema = def.make_schema().to_json_schema(defs, ref_prefix);
            rendered.insert(def.name().to_string(), schema);
        }
    }
}

fn tags(link: &Link, sections: &[&Section]) -> Vec<String> {
    sections
        .first()
        .map(|section| section.name.clone())
        .into_iter()
        .chain(link.tags.iter().cloned())
        .collect()
}

/// The path component of a link URL, dropping any scheme and host
fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if without_scheme.len() == url.len() {
        url
    } else {
        without_scheme
            .find('/')
            .map_or("/", |index| &without_scheme[index..])
    };
    path.split(['?', '#']).next().unwrap_or(path)
}
