//! Swagger 2.0

use super::{operation_base, parameter_base, paths, render_definitions, Definitions, DocumentCodec};
use crate::document::{Document, Link};
use hyper::Uri;
use serde_json::{json, Map, Value as Json};

const REF_PREFIX: &str = "#/definitions/";

/// Encodes documents as Swagger 2.0
#[derive(Debug, Default, Clone, Copy)]
pub struct SwaggerCodec;

impl DocumentCodec for SwaggerCodec {
    fn media_type(&self) -> &'static str {
        "application/swagger"
    }

    fn encode(&self, document: &Document) -> Json {
        let mut defs = Definitions::new();
        let paths = paths(document, &mut defs, operation);

        let mut out = Map::new();
        out.insert("swagger".to_string(), json!("2.0"));
        out.insert(
            "info".to_string(),
            json!({
                "version": document.version,
                "title": document.title,
                "description": document.description,
            }),
        );
        if let Ok(uri) = document.url.parse::<Uri>() {
            if let Some(host) = uri.authority() {
                out.insert("host".to_string(), json!(host.as_str()));
                out.insert("basePath".to_string(), json!(uri.path()));
                if let Some(scheme) = uri.scheme_str() {
                    out.insert("schemes".to_string(), json!([scheme]));
                }
            }
        }
        out.insert("paths".to_string(), paths);
        if !defs.is_empty() {
            out.insert(
                "definitions".to_string(),
                Json::Object(render_definitions(&mut defs, REF_PREFIX)),
            );
        }
        Json::Object(out)
    }
}

fn operation(link: &Link, tags: Vec<String>, defs: &mut Definitions) -> Json {
    let mut op = operation_base(link, tags);

    let mut parameters: Vec<Json> = link
        .path_fields()
        .chain(link.query_fields())
        .map(|field| {
            let mut parameter = parameter_base(field);
            // Non-body parameters carry their schema keywords inline.
            if let Json::Object(schema) = field.schema.to_json_schema(defs, REF_PREFIX) {
                for (key, value) in schema {
                    if key != "nullable" {
                        parameter.entry(key).or_insert(value);
                    }
                }
            }
            Json::Object(parameter)
        })
        .collect();
    if let Some(body) = link.body_field() {
        let mut parameter = parameter_base(body);
        parameter.insert("schema".to_string(), body.schema.to_json_schema(defs, REF_PREFIX));
        parameters.push(Json::Object(parameter));
        let encoding = link.encoding.as_deref().unwrap_or("application/json");
        op.insert("consumes".to_string(), json!([encoding]));
    }
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), Json::Array(parameters));
    }

    let responses = match &link.response {
        Some(response) => {
            let mut entry = json!({"description": ""});
            if let (Some(encoding), Some(schema)) = (&response.encoding, &response.schema) {
                entry["schema"] = schema.to_json_schema(defs, REF_PREFIX);
                op.insert("produces".to_string(), json!([encoding]));
            }
            json!({response.status_code.to_string(): entry})
        }
        None => json!({"default": {"description": ""}}),
    };
    op.insert("responses".to_string(), responses);

    Json::Object(op)
}
