//! # API Document
//!
//! The externally visible contract of an application: links grouped into
//! sections, ready to be encoded as OpenAPI or Swagger.

use crate::router::Method;
use crate::schema::Schema;

/// Where a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// URL path segment
    Path,
    /// Query string
    Query,
    /// Request body
    Body,
}

impl Location {
    /// Lower-case name as used by API documents
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
        }
    }
}

/// One named, located input of a link
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Location
    pub location: Location,
    /// Whether the field must be present
    pub required: bool,
    /// Value schema
    pub schema: Schema,
    /// Description
    pub description: String,
    /// Example value
    pub example: Option<serde_json::Value>,
}

impl Field {
    /// Create a field with no description or example
    pub fn new(name: impl Into<String>, location: Location, required: bool, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location,
            required,
            schema,
            description: String::new(),
            example: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared response of a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResponse {
    /// Response media type, absent for empty responses
    pub encoding: Option<String>,
    /// Status code
    pub status_code: u16,
    /// Body schema, absent for empty responses
    pub schema: Option<Schema>,
}

impl LinkResponse {
    /// A `204 No Content` response
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            encoding: None,
            status_code: 204,
            schema: None,
        }
    }

    /// A `200` JSON response with the given schema
    #[must_use]
    pub fn json(schema: Schema) -> Self {
        Self {
            encoding: Some("application/json".to_string()),
            status_code: 200,
            schema: Some(schema),
        }
    }
}

/// The contract of one route
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Route name (operation id)
    pub name: String,
    /// HTTP method
    pub method: Method,
    /// URL template
    pub url: String,
    /// Request body media type
    pub encoding: Option<String>,
    /// Inputs, in declaration order
    pub fields: Vec<Field>,
    /// Declared response
    pub response: Option<LinkResponse>,
    /// Short summary
    pub title: String,
    /// Long description
    pub description: String,
    /// Extra tags
    pub tags: Vec<String>,
}

impl Link {
    /// Fields read from the path
    pub fn path_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields_at(Location::Path)
    }

    /// Fields read from the query string
    pub fn query_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields_at(Location::Query)
    }

    /// The body field, if any
    #[must_use]
    pub fn body_field(&self) -> Option<&Field> {
        self.fields_at(Location::Body).next()
    }

    fn fields_at(&self, location: Location) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.location == location)
    }
}

/// A link or a nested section
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// A single link
    Link(Link),
    /// A named group
    Section(Section),
}

/// A named group of links and sections
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Section name
    pub name: String,
    /// Ordered content
    pub content: Vec<Content>,
}

impl Section {
    /// Every link in this section and its subsections, depth-first
    #[must_use]
    pub fn links(&self) -> Vec<&Link> {
        let mut links = Vec::new();
        collect_links(&self.content, &mut links);
        links
    }

    /// Prefix every link URL in this section and its subsections
    pub fn prefix_urls(&mut self, prefix: &str) {
        prefix_content(&mut self.content, prefix);
    }
}

fn collect_links<'a>(content: &'a [Content], out: &mut Vec<&'a Link>) {
    for item in content {
        match item {
            Content::Link(link) => out.push(link),
            Content::Section(section) => collect_links(&section.content, out),
        }
    }
}

fn prefix_content(content: &mut [Content], prefix: &str) {
    for item in content {
        match item {
            Content::Link(link) => link.url = format!("{prefix}{}", link.url),
            Content::Section(section) => prefix_content(&mut section.content, prefix),
        }
    }
}

/// The whole API surface of an application
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// API title
    pub title: String,
    /// API description
    pub description: String,
    /// API version
    pub version: String,
    /// Server URL
    pub url: String,
    /// Ordered content
    pub content: Vec<Content>,
}

impl Document {
    /// Create a document from its content
    #[must_use]
    pub fn new(content: Vec<Content>) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    /// Every link with the chain of sections enclosing it, depth-first
    #[must_use]
    pub fn walk_links(&self) -> Vec<(&Link, Vec<&Section>)> {
        let mut out = Vec::new();
        walk(&self.content, &mut Vec::new(), &mut out);
        out
    }
}

fn walk<'a>(
    content: &'a [Content],
    sections: &mut Vec<&'a Section>,
    out: &mut Vec<(&'a Link, Vec<&'a Section>)>,
) {
    for item in content {
        match item {
            Content::Link(link) => out.push((link, sections.clone())),
            Content::Section(section) => {
                sections.push(section);
                walk(&section.content, sections, out);
                sections.pop();
            }
        }
    }
}

crate::types::impl_named!(Document);

#[cfg(test)]
mod tests {
    use super::*;

    fn link(name: &str, url: &str) -> Link {
        Link {
            name: name.to_string(),
            method: Method::Get,
            url: url.to_string(),
            encoding: None,
            fields: vec![
                Field::new("id", Location::Path, true, Schema::integer()),
                Field::new("q", Location::Query, false, Schema::string()),
            ],
            response: None,
            title: String::new(),
            description: String::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_field_helpers() {
        let link = link("get", "/{id}");
        assert_eq!(link.path_fields().count(), 1);
        assert_eq!(link.query_fields().next().map(|f| f.name.as_str()), Some("q"));
        assert!(link.body_field().is_none());
    }

    #[test]
    fn test_walk_links_reports_sections() {
        let inner = Section {
            name: "inner".to_string(),
            content: vec![Content::Link(link("b", "/b"))],
        };
        let outer = Section {
            name: "outer".to_string(),
            content: vec![Content::Link(link("a", "/a")), Content::Section(inner)],
        };
        let document = Document::new(vec![Content::Link(link("root", "/")), Content::Section(outer)]);

        let walked: Vec<(&str, Vec<&str>)> = document
            .walk_links()
            .into_iter()
            .map(|(l, s)| (l.name.as_str(), s.iter().map(|s| s.name.as_str()).collect()))
            .collect();
        assert_eq!(
            walked,
            vec![
                ("root", vec![]),
                ("a", vec!["outer"]),
                ("b", vec!["outer", "inner"]),
            ]
        );
    }

    #[test]
    fn test_prefix_urls_is_recursive() {
        let mut section = Section {
            name: "s".to_string(),
            content: vec![
                Content::Link(link("a", "/a")),
                Content::Section(Section {
                    name: "t".to_string(),
                    content: vec![Content::Link(link("b", "/b"))],
                }),
            ],
        };
        section.prefix_urls("/api");
        let urls: Vec<&str> = section.links().iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["/api/a", "/api/b"]);
    }
}
