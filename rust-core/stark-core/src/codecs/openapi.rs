//! OpenAPI 3.0.0

use super::{operation_base, parameter_base, paths, render_definitions, Definitions, DocumentCodec};
use crate::document::{Document, Link};
use serde_json::{json, Map, Value as Json};

const REF_PREFIX: &str = "#/components/schemas/";

/// Encodes documents as OpenAPI 3.0.0
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenApiCodec;

impl DocumentCodec for OpenApiCodec {
    fn media_type(&self) -> &'static str {
        "application/vnd.oai.openapi"
    }

    fn encode(&self, document: &Document) -> Json {
        let mut defs = Definitions::new();
        let paths = paths(document, &mut defs, operation);

        let mut out = Map::new();
        out.insert("openapi".to_string(), json!("3.0.0"));
        out.insert(
            "info".to_string(),
            json!({
                "version": document.version,
                "title": document.title,
                "description": document.description,
            }),
        );
        if !document.url.is_empty() {
            out.insert("servers".to_string(), json!([{"url": document.url}]));
        }
        out.insert("paths".to_string(), paths);
        if !defs.is_empty() {
            out.insert(
                "components".to_string(),
                json!({"schemas": render_definitions(&mut defs, REF_PREFIX)}),
            );
        }
        Json::Object(out)
    }
}

fn operation(link: &Link, tags: Vec<String>, defs: &mut Definitions) -> Json {
    let mut op = operation_base(link, tags);

    let parameters: Vec<Json> = link
        .path_fields()
        .chain(link.query_fields())
        .map(|field| {
            let mut parameter = parameter_base(field);
            parameter.insert("schema".to_string(), field.schema.to_json_schema(defs, REF_PREFIX));
            Json::Object(parameter)
        })
        .collect();
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), Json::Array(parameters));
    }

    if let Some(body) = link.body_field() {
        let encoding = link.encoding.as_deref().unwrap_or("application/json");
        op.insert(
            "requestBody".to_string(),
            json!({"content": {encoding: {"schema": body.schema.to_json_schema(defs, REF_PREFIX)}}}),
        );
    }

    let responses = match &link.response {
        Some(response) => {
            let mut entry = json!({"description": ""});
            if let (Some(encoding), Some(schema)) = (&response.encoding, &response.schema) {
                entry["content"] = json!({encoding.as_str(): {"schema": schema.to_json_schema(defs, REF_PREFIX)}});
            }
            json!({response.status_code.to_string(): entry})
        }
        None => json!({"default": {"description": ""}}),
    };
    op.insert("responses".to_string(), responses);

    Json::Object(op)
}
