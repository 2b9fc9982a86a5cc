//! # Stark Core
//!
//! Dependency injection, route contracts and API documents for HTTP
//! handlers.
//!
//! ## Architecture
//!
//! Handlers are plain functions wrapped as [`Callable`]s. Every parameter
//! is supplied by a [`Resolver`]: either from the request state or by a
//! [`Component`] that knows how to build values of that type. Routes derive
//! their public contract (path, query and body fields plus response schema)
//! from the same parameter declarations, so the generated OpenAPI document
//! always matches what the handler actually receives.
//!
//! ## Modules
//!
//! - `app` - Application builder and request pipeline
//! - `injector` - Planning and running dependency graphs
//! - `component` - Component trait and registry
//! - `builtin` - Request components (query, headers, validated data, ...)
//! - `callable` - Type-erased functions with declared parameters
//! - `types` - Type tags and the `Annotated` trait
//! - `state` - Type-erased values and pipeline state
//! - `schema` - Field schemas, schema types and validation
//! - `route` - Routes, includes and link generation
//! - `router` - URL matching with matchit (radix trie)
//! - `request` / `response` - HTTP request and response values
//! - `hooks` - Request lifecycle hooks
//! - `document` - API document model
//! - `codecs` - OpenAPI and Swagger encoders
//! - `docstrings` - Doc string parsing for summaries and field descriptions
//! - `json` - JSON parsing with simd-json
//! - `settings` - Application configuration
//! - `logging` - Tracing subscriber setup
//! - `validation` - Structured validation errors
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

extern crate self as stark_core;

pub mod app;
pub mod builtin;
pub mod callable;
pub mod codecs;
pub mod component;
pub mod docstrings;
pub mod document;
pub mod error;
pub mod hooks;
pub mod injector;
pub mod json;
pub mod logging;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod settings;
pub mod state;
pub mod types;
pub mod validation;

pub use app::{render_value, App, AppBuilder, Exception};
pub use builtin::{
    default_components, CompositeParamComponent, PrimitiveParamComponent, RequestData, ValidatedPathParams,
    ValidatedQueryParams, ValidatedRequestData,
};
pub use callable::{Callable, CallableBuilder, Parameter};
pub use codecs::{DocumentCodec, OpenApiCodec, SwaggerCodec};
pub use component::{Component, Components, FnComponent, Singleton};
pub use document::{Content, Document, Field, Link, LinkResponse, Location, Section};
pub use error::{Error, HttpError, Result};
pub use hooks::{CorsHook, EventHook, EventHooks, LoggingHook};
pub use injector::{Plan, Resolver};
pub use json::{parse_json, to_json};
pub use logging::init_tracing;
pub use request::{Body, Headers, PathParams, QueryParams, Request};
pub use response::Response;
pub use route::{Include, Route, RouteItem};
pub use router::{Method, Router};
pub use schema::{Schema, SchemaDef, SchemaType};
pub use settings::Settings;
pub use stark_macros::{handler, Annotated, SchemaType};
pub use state::{Args, State, Value};
pub use types::{Annotated, Decimal, Header, QueryParam, ReturnValue, TypeTag};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
