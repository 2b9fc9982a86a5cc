//! # Built-in Components
//!
//! Components every application starts with: transport views of the
//! request, body decoding, input validation against the route's link, and
//! the two components that feed handler parameters from validated input.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Each component produces exactly one value
//! - **O**: Applications add components after these, they never edit them
//! - **D**: Validation reads the route's `Link`, not the handler signature
//!
//! ## Error mapping
//!
//! | Component             | Failure                         | Status |
//! |-----------------------|---------------------------------|--------|
//! | `request_data`        | unsupported `Content-Type`      | 415    |
//! | `request_data`        | undecodable body                | 400    |
//! | `validated_path`      | path segment fails its schema   | 404    |
//! | `validated_query`     | query value fails its schema    | 400    |
//! | `validated_data`      | body fails the body field       | 400    |

use crate::callable::{Callable, Parameter};
use crate::component::{Component, Components};
use crate::error::{Error, HttpError, Result};
use crate::json::parse_json_bytes;
use crate::request::{parse_query_string, Body, Headers, PathParams, QueryParams, Request};
use crate::route::Route;
use crate::router::Method;
use crate::schema::{Schema, SchemaKind};
use crate::state::{Args, Value};
use crate::types::{impl_named, Header, QueryParam, TypeTag};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// Decoded request body (`null` when the body is empty)
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData(pub Json);

/// Path parameters coerced by the route's path fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPathParams(pub Map<String, Json>);

/// Query parameters coerced by the route's query fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedQueryParams(pub Map<String, Json>);

/// Request data validated by the route's body field
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequestData(pub Json);

impl_named!(RequestData, ValidatedPathParams, ValidatedQueryParams, ValidatedRequestData);

/// The built-in registry, in priority order
#[must_use]
pub fn default_components() -> Components {
    let mut components = Components::new();
    components
        .add_fn(method())
        .add_fn(query_params())
        .add_fn(headers())
        .add_fn(body())
        .add_fn(query_param())
        .add_fn(header())
        .add_fn(request_data())
        .add_fn(validated_path())
        .add_fn(validated_query())
        .add_fn(validated_data())
        .add(PrimitiveParamComponent::new())
        .add(CompositeParamComponent::new());
    components
}

fn method() -> Callable {
    Callable::builder("method")
        .param::<Request>("request")
        .returns::<Method>()
        .sync(|args| {
            let request: Arc<Request> = args.get("request")?;
            Ok(Value::new(request.method))
        })
}

fn query_params() -> Callable {
    Callable::builder("query_params")
        .param::<Request>("request")
        .returns::<QueryParams>()
        .sync(|args| {
            let request: Arc<Request> = args.get("request")?;
            Ok(Value::new(QueryParams(request.query_pairs().to_vec())))
        })
}

fn headers() -> Callable {
    Callable::builder("headers")
        .param::<Request>("request")
        .returns::<Headers>()
        .sync(|args| {
            let request: Arc<Request> = args.get("request")?;
            Ok(Value::new(Headers(request.headers().clone())))
        })
}

fn body() -> Callable {
    Callable::builder("body")
        .param::<Request>("request")
        .returns::<Body>()
        .sync(|args| {
            let request: Arc<Request> = args.get("request")?;
            Ok(Value::new(Body(request.body().clone())))
        })
}

fn query_param() -> Callable {
    Callable::builder("query_param")
        .param::<Parameter>("parameter")
        .param::<QueryParams>("query_params")
        .returns::<QueryParam>()
        .sync(|args| {
            let parameter: Parameter = args.get("parameter")?;
            let query: Arc<QueryParams> = args.get("query_params")?;
            Ok(Value::new(QueryParam(query.get(&parameter.name).map(String::from))))
        })
}

fn header() -> Callable {
    Callable::builder("header")
        .param::<Parameter>("parameter")
        .param::<Headers>("headers")
        .returns::<Header>()
        .sync(|args| {
            let parameter: Parameter = args.get("parameter")?;
            let headers: Arc<Headers> = args.get("headers")?;
            let name = parameter.name.replace('_', "-");
            Ok(Value::new(Header(headers.get(&name).map(String::from))))
        })
}

fn request_data() -> Callable {
    Callable::builder("request_data")
        .param::<Body>("content")
        .param::<Headers>("headers")
        .returns::<RequestData>()
        .sync(|args| {
            let content: Arc<Body> = args.get("content")?;
            let headers: Arc<Headers> = args.get("headers")?;
            let data = decode_body(&content.0, headers.get("content-type"))?;
            Ok(Value::new(RequestData(data)))
        })
}

/// Decode a request body by media type
///
/// An empty body decodes to `null` whatever the content type. JSON (and
/// `+json` media types) and URL-encoded forms are supported; repeated form
/// keys become arrays.
///
/// # Errors
///
/// Returns a 415 `HttpError` for any other content type and a 400 for a
/// body that does not decode.
pub fn decode_body(content: &[u8], content_type: Option<&str>) -> Result<Json> {
    if content.is_empty() {
        return Ok(Json::Null);
    }
    let media = content_type.map(|ct| {
        ct.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    });
    match media.as_deref() {
        Some(m) if m == "application/json" || m.ends_with("+json") => parse_json_bytes(content)
            .map_err(|e| HttpError::bad_request(format!("Invalid JSON - {e}")).into()),
        Some("application/x-www-form-urlencoded") => {
            let text = std::str::from_utf8(content)
                .map_err(|_| Error::from(HttpError::bad_request("Invalid form encoding")))?;
            Ok(form_to_json(parse_query_string(Some(text))))
        }
        _ => Err(HttpError::unsupported_media_type().into()),
    }
}

fn form_to_json(pairs: Vec<(String, String)>) -> Json {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Json::Array(values)) => values.push(Json::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Json::Array(vec![first, Json::String(value)]);
            }
            None => {
                map.insert(key, Json::String(value));
            }
        }
    }
    Json::Object(map)
}

fn validated_path() -> Callable {
    Callable::builder("validated_path")
        .param::<Route>("route")
        .param::<PathParams>("path_params")
        .returns::<ValidatedPathParams>()
        .sync(|args| {
            let route: Arc<Route> = args.get("route")?;
            let params: Arc<PathParams> = args.get("path_params")?;
            let fields: Vec<_> = route.link().path_fields().collect();
            let validator = Schema::object(
                fields.iter().map(|f| (f.name.clone(), f.schema.clone())).collect(),
                fields.iter().map(|f| f.name.clone()).collect(),
            );
            let input: Map<String, Json> = params
                .0
                .iter()
                .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                .collect();
            let validated = validator
                .validate(&Json::Object(input))
                .map_err(|errors| HttpError::not_found(errors.to_detail()))?;
            Ok(Value::new(ValidatedPathParams(into_map(validated))))
        })
}

fn validated_query() -> Callable {
    Callable::builder("validated_query")
        .param::<Route>("route")
        .param::<QueryParams>("query_params")
        .returns::<ValidatedQueryParams>()
        .sync(|args| {
            let route: Arc<Route> = args.get("route")?;
            let query: Arc<QueryParams> = args.get("query_params")?;
            let fields: Vec<_> = route.link().query_fields().collect();
            let validator = Schema::object(
                fields.iter().map(|f| (f.name.clone(), f.schema.clone())).collect(),
                fields.iter().filter(|f| f.required).map(|f| f.name.clone()).collect(),
            );
            let mut input = Map::new();
            for field in &fields {
                if matches!(field.schema.kind, SchemaKind::Array { .. }) {
                    let values = query.get_all(&field.name);
                    if !values.is_empty() {
                        let items = values.into_iter().map(|v| Json::String(v.to_string())).collect();
                        input.insert(field.name.clone(), Json::Array(items));
                    }
                } else if let Some(value) = query.get(&field.name) {
                    input.insert(field.name.clone(), Json::String(value.to_string()));
                }
            }
            let validated = validator
                .validate(&Json::Object(input))
                .map_err(|errors| HttpError::bad_request(errors.to_detail()))?;
            Ok(Value::new(ValidatedQueryParams(into_map(validated))))
        })
}

fn validated_data() -> Callable {
    Callable::builder("validated_data")
        .param::<Route>("route")
        .param::<RequestData>("data")
        .returns::<ValidatedRequestData>()
        .sync(|args| {
            let route: Arc<Route> = args.get("route")?;
            let data: Arc<RequestData> = args.get("data")?;
            let Some(field) = route.link().body_field() else {
                return Ok(Value::new(ValidatedRequestData(data.0.clone())));
            };
            let validated = field
                .schema
                .validate(&data.0)
                .map_err(|errors| HttpError::bad_request(errors.to_detail()))?;
            Ok(Value::new(ValidatedRequestData(validated)))
        })
}

fn into_map(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        _ => Map::new(),
    }
}

fn is_primitive_like(tag: &TypeTag) -> bool {
    match tag {
        TypeTag::Sequence(inner) | TypeTag::Set(inner) | TypeTag::VarTuple(inner) => inner.is_primitive(),
        TypeTag::Tuple(items) => items.iter().all(TypeTag::is_primitive),
        tag => tag.is_primitive(),
    }
}

/// Supplies primitive and container parameters from validated input
///
/// A value captured in the path wins over a query value of the same name.
/// A missing optional value resolves to `null`.
#[derive(Debug, Clone)]
pub struct PrimitiveParamComponent {
    resolver: Callable,
}

impl PrimitiveParamComponent {
    /// Create the component
    #[must_use]
    pub fn new() -> Self {
        let resolver = Callable::builder("primitive_param")
            .param::<Parameter>("parameter")
            .param::<ValidatedPathParams>("path_params")
            .param::<ValidatedQueryParams>("query_params")
            .returns::<Json>()
            .sync(resolve_primitive);
        Self { resolver }
    }
}

impl Default for PrimitiveParamComponent {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_primitive(args: Args) -> Result<Value> {
    let parameter: Parameter = args.get("parameter")?;
    let path: Arc<ValidatedPathParams> = args.get("path_params")?;
    let query: Arc<ValidatedQueryParams> = args.get("query_params")?;
    let value = path
        .0
        .get(&parameter.name)
        .or_else(|| query.0.get(&parameter.name))
        .cloned()
        .unwrap_or(Json::Null);
    Ok(Value::new(value))
}

impl Component for PrimitiveParamComponent {
    fn resolver(&self) -> &Callable {
        &self.resolver
    }

    fn can_handle_parameter(&self, parameter: &Parameter) -> bool {
        let (inner, _) = parameter.annotation.unwrap_optional();
        is_primitive_like(inner)
    }
}

/// Supplies schema-typed parameters
///
/// For `GET` and `DELETE` the value is assembled from the flattened query
/// fields; otherwise it is the validated request body.
#[derive(Debug, Clone)]
pub struct CompositeParamComponent {
    resolver: Callable,
}

impl CompositeParamComponent {
    /// Create the component
    #[must_use]
    pub fn new() -> Self {
        let resolver = Callable::builder("composite_param")
            .param::<Parameter>("parameter")
            .param::<Route>("route")
            .param::<ValidatedQueryParams>("query_params")
            .param::<ValidatedRequestData>("data")
            .returns::<Json>()
            .sync(resolve_composite);
        Self { resolver }
    }
}

impl Default for CompositeParamComponent {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_composite(args: Args) -> Result<Value> {
    let parameter: Parameter = args.get("parameter")?;
    let route: Arc<Route> = args.get("route")?;
    if route.method().is_query_method() {
        if let (TypeTag::Schema(def), _) = parameter.annotation.unwrap_optional() {
            let query: Arc<ValidatedQueryParams> = args.get("query_params")?;
            let object: Map<String, Json> = def
                .properties()
                .iter()
                .filter(|p| !p.read_only)
                .filter_map(|p| query.0.get(&p.name).map(|v| (p.name.clone(), v.clone())))
                .collect();
            return Ok(Value::new(Json::Object(object)));
        }
    }
    let data: Arc<ValidatedRequestData> = args.get("data")?;
    Ok(Value::new(data.0.clone()))
}

impl Component for CompositeParamComponent {
    fn resolver(&self) -> &Callable {
        &self.resolver
    }

    fn can_handle_parameter(&self, parameter: &Parameter) -> bool {
        match parameter.annotation.unwrap_optional().0 {
            TypeTag::Schema(_) => true,
            TypeTag::Sequence(inner) => matches!(**inner, TypeTag::Schema(_)),
            _ => false,
        }
    }
}
