//! # Application
//!
//! Assembles settings, components, routes and hooks into a request handler.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: The app only sequences pipelines, the resolver runs them
//! - **O**: Behaviour is extended with components and hooks
//! - **D**: Transport-neutral, requests arrive as [`Request`] values
//!
//! ## Request lifecycle
//!
//! 1. Route lookup (404 / 405 are HTTP errors like any other)
//! 2. Standalone routes run `[handler]`; others run
//!    `on_request hooks + [handler, render_response] + on_response hooks`
//! 3. On error: `[exception_handler] + on_response hooks`
//! 4. If that fails too: `on_error hooks + [error_handler]` (500)

use crate::builtin::default_components;
use crate::callable::Callable;
use crate::codecs::{DocumentCodec, OpenApiCodec};
use crate::component::{Component, Components};
use crate::document::Document;
use crate::error::{Error, HttpError, Result};
use crate::hooks::{EventHook, EventHooks};
use crate::injector::{Resolver, RETURN_VALUE};
use crate::request::{PathParams, Request};
use crate::response::Response;
use crate::route::{generate_document, Route, RouteItem};
use crate::router::Router;
use crate::settings::Settings;
use crate::state::{State, Value};
use crate::types::{impl_named, Annotated, ReturnValue, TypeTag};
use hyper::body::Bytes;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The error being handled, bound as `exc`
///
/// Empty while a request is processed normally.
#[derive(Debug, Clone, Default)]
pub struct Exception(pub Option<Arc<Error>>);

impl Exception {
    /// The wrapped error, if any
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.0.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(error) => write!(f, "{error}"),
            None => f.write_str("no exception"),
        }
    }
}

impl_named!(Exception);

/// Builder for [`App`]
#[must_use]
pub struct AppBuilder {
    settings: Settings,
    components: Components,
    singletons: Vec<Callable>,
    routes: Vec<RouteItem>,
    hooks: Vec<Arc<dyn EventHook>>,
    allow_async: bool,
}

impl AppBuilder {
    fn new() -> Self {
        Self {
            settings: Settings::default(),
            components: Components::new(),
            singletons: Vec::new(),
            routes: Vec::new(),
            hooks: Vec::new(),
            allow_async: false,
        }
    }

    /// Use these settings
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a component after the built-in ones
    pub fn component<C: Component + 'static>(mut self, component: C) -> Self {
        self.components.add(component);
        self
    }

    /// Register a callable component, matched by its return annotation
    pub fn component_fn(mut self, resolver: Callable) -> Self {
        self.components.add_fn(resolver);
        self
    }

    /// Register a singleton component
    ///
    /// Validated when the app is built.
    pub fn singleton(mut self, resolver: Callable) -> Self {
        self.singletons.push(resolver);
        self
    }

    /// Add a route or include
    pub fn route(mut self, item: impl Into<RouteItem>) -> Self {
        self.routes.push(item.into());
        self
    }

    /// Add several routes or includes
    pub fn routes<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RouteItem>,
    {
        self.routes.extend(items.into_iter().map(Into::into));
        self
    }

    /// Add an event hook
    pub fn hook<H: EventHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Allow async handlers and components (requires `handle_async`)
    pub fn allow_async(mut self, allow: bool) -> Self {
        self.allow_async = allow;
        self
    }

    /// Set up routes, plan every pipeline and generate the document
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for invalid singletons, unsupported
    /// route parameters, unresolvable parameters or async callables in a
    /// sync app, and `Error::InvalidRoutePattern` for bad URLs.
    pub fn build(self) -> Result<App> {
        let mut components = default_components();
        components.extend(self.components);
        for resolver in self.singletons {
            components.add_singleton(resolver)?;
        }

        let initial = initial_bindings();
        let resolver = if self.allow_async {
            Resolver::new_async(components, initial)
        } else {
            Resolver::new(components, initial)
        };

        let mut routes = self.routes;
        if let Some(url) = &self.settings.schema_url {
            routes.push(Route::get(url.clone(), serve_schema())?.documented(false).into());
        }
        for item in &mut routes {
            item.setup(&resolver)?;
        }
        let router = Router::new(&routes)?;

        let mut document = generate_document(&routes);
        document.title.clone_from(&self.settings.title);
        document.description.clone_from(&self.settings.description);
        document.version.clone_from(&self.settings.version);
        document.url.clone_from(&self.settings.url);

        let app = App {
            settings: Arc::new(self.settings),
            resolver,
            router,
            document: Arc::new(document),
            hooks: EventHooks::new(&self.hooks),
            render_response: render_response(),
            exception_handler: exception_handler(),
            error_handler: error_handler(),
        };
        app.plan_all()?;
        Ok(app)
    }
}

fn initial_bindings() -> Vec<(&'static str, TypeTag)> {
    vec![
        ("request", Request::annotation()),
        ("exc", Exception::annotation()),
        ("document", Document::annotation()),
        ("path_params", PathParams::annotation()),
        ("route", Route::annotation()),
        ("response", Response::annotation()),
        ("settings", Settings::annotation()),
    ]
}

/// A configured application
pub struct App {
    settings: Arc<Settings>,
    resolver: Resolver,
    router: Router,
    document: Arc<Document>,
    hooks: EventHooks,
    render_response: Callable,
    exception_handler: Callable,
    error_handler: Callable,
}

impl App {
    /// Start building an application
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Settings in use
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Generated API document
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The resolver running every pipeline
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The router
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Build the URL of a named route
    ///
    /// # Errors
    ///
    /// Returns `Error::NoReverseMatch` for an unknown name or missing
    /// parameter.
    pub fn reverse_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        self.router.reverse_url(name, params)
    }

    fn plan_all(&self) -> Result<()> {
        let empty = State::new();
        for route in self.router.routes() {
            debug!(route = route.name(), method = %route.method(), url = route.url(), "Planning route");
            self.resolver.plan(&self.pipeline(route), &empty, true)?;
        }
        self.resolver.plan(&self.exception_pipeline(), &empty, true)?;
        self.resolver.plan(&self.error_pipeline(), &empty, true)?;
        Ok(())
    }

    fn pipeline(&self, route: &Route) -> Vec<Callable> {
        if route.is_standalone() {
            return vec![route.handler().clone()];
        }
        let mut funcs = self.hooks.on_request().to_vec();
        funcs.push(route.handler().clone());
        funcs.push(self.render_response.clone());
        funcs.extend_from_slice(self.hooks.on_response());
        funcs
    }

    fn exception_pipeline(&self) -> Vec<Callable> {
        let mut funcs = vec![self.exception_handler.clone()];
        funcs.extend_from_slice(self.hooks.on_response());
        funcs
    }

    fn error_pipeline(&self) -> Vec<Callable> {
        let mut funcs = self.hooks.on_error().to_vec();
        funcs.push(self.error_handler.clone());
        funcs
    }

    fn seed_state(&self, request: &Arc<Request>) -> State {
        let mut state = State::new();
        state.insert("request", Value::from_arc(Arc::clone(request)));
        state.insert("exc", Value::new(Exception::default()));
        state.insert("document", Value::from_arc(Arc::clone(&self.document)));
        state.insert("path_params", Value::new(PathParams::default()));
        state.insert("route", Value::none());
        state.insert("response", Value::none());
        state.insert("settings", Value::from_arc(Arc::clone(&self.settings)));
        state
    }

    fn prepare(&self, request: &Request, state: &mut State) -> Result<Vec<Callable>> {
        let size = request.body().len();
        if size > self.settings.max_body_size {
            return Err(HttpError::payload_too_large(self.settings.max_body_size, size).into());
        }
        let (route, path_params) = self.router.lookup(&request.path, request.method)?;
        let funcs = self.pipeline(&route);
        state.insert("route", Value::from_arc(route));
        state.insert("path_params", Value::new(path_params));
        Ok(funcs)
    }

    fn error_state(&self, request: &Arc<Request>, state: &State, error: Error) -> State {
        let mut fresh = self.seed_state(request);
        for key in ["route", "path_params"] {
            if let Some(value) = state.get(key) {
                fresh.insert(key, value.clone());
            }
        }
        fresh.insert("exc", Value::new(Exception(Some(Arc::new(error)))));
        fresh
    }

    /// Handle a request synchronously
    ///
    /// Never fails: errors become error responses.
    pub fn handle(&self, request: Request) -> Response {
        let request = Arc::new(request);
        let mut state = self.seed_state(&request);
        let result = self
            .prepare(&request, &mut state)
            .and_then(|funcs| self.resolver.run(&funcs, &mut state))
            .and_then(|_| final_response(&state));
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                let mut state = self.error_state(&request, &state, error);
                match self
                    .resolver
                    .run(&self.exception_pipeline(), &mut state)
                    .and_then(|_| final_response(&state))
                {
                    Ok(response) => response,
                    Err(unhandled) => {
                        log_unhandled(&request, &unhandled);
                        let outcome = self
                            .resolver
                            .run(&self.error_pipeline(), &mut state)
                            .and_then(|_| final_response(&state));
                        outcome.unwrap_or_else(|e| last_resort(&request, &e))
                    }
                }
            }
        };
        log_response(&request, &response);
        response
    }

    /// Handle a request, awaiting async handlers and components
    ///
    /// Never fails: errors become error responses.
    pub async fn handle_async(&self, request: Request) -> Response {
        let request = Arc::new(request);
        let mut state = self.seed_state(&request);
        let result = match self.prepare(&request, &mut state) {
            Ok(funcs) => self.resolver.run_async(&funcs, &mut state).await,
            Err(error) => Err(error),
        };
        let result = result.and_then(|_| final_response(&state));
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                let mut state = self.error_state(&request, &state, error);
                let handled = self
                    .resolver
                    .run_async(&self.exception_pipeline(), &mut state)
                    .await
                    .and_then(|_| final_response(&state));
                match handled {
                    Ok(response) => response,
                    Err(unhandled) => {
                        log_unhandled(&request, &unhandled);
                        let outcome = self
                            .resolver
                            .run_async(&self.error_pipeline(), &mut state)
                            .await
                            .and_then(|_| final_response(&state));
                        outcome.unwrap_or_else(|e| last_resort(&request, &e))
                    }
                }
            }
        };
        log_response(&request, &response);
        response
    }

    /// Handle a collected hyper request
    pub async fn handle_http(&self, request: hyper::Request<Bytes>) -> hyper::Response<Bytes> {
        let response = match Request::from_http(request) {
            Ok(request) => self.handle_async(request).await,
            Err(_) => http_error_response(&HttpError::method_not_allowed()),
        };
        response.into_http().unwrap_or_else(|e| {
            error!(error = %e, "Invalid response");
            let mut fallback = hyper::Response::new(Bytes::from_static(b"\"Server error\""));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("router", &self.router)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

fn log_unhandled(request: &Request, error: &Error) {
    warn!(
        method = %request.method,
        path = %request.path,
        error = %error,
        "Unhandled error, using error handler"
    );
}

fn log_response(request: &Request, response: &Response) {
    debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        "Request handled"
    );
}

fn last_resort(request: &Request, error: &Error) -> Response {
    error!(
        method = %request.method,
        path = %request.path,
        error = %error,
        "Error handler failed"
    );
    Response::json(&json!("Server error")).with_status(500)
}

/// The response stored by the pipeline, or the rendered return value
fn final_response(state: &State) -> Result<Response> {
    if let Some(response) = state.get_as::<Response>("response") {
        return Ok(response);
    }
    match state.get(RETURN_VALUE) {
        Some(value) => render_value(value),
        None => Ok(Response::no_content()),
    }
}

/// Turn a handler's return value into a response
///
/// `Response` passes through, none or unit is `204 No Content`, `String` is
/// HTML and anything with a JSON form is JSON.
///
/// # Errors
///
/// Returns `Error::Configuration` for values with no JSON form.
pub fn render_value(value: &Value) -> Result<Response> {
    if let Some(response) = value.downcast_ref::<Response>() {
        return Ok(response.clone());
    }
    if value.is_none() {
        return Ok(Response::no_content());
    }
    if let Some(html) = value.downcast_ref::<String>() {
        return Ok(Response::html(html.clone()));
    }
    value.to_json().map(|json| Response::json(&json)).ok_or_else(|| {
        Error::configuration(format!(
            "Cannot render a return value of type {}.",
            value.type_name()
        ))
    })
}

fn http_error_response(error: &HttpError) -> Response {
    error
        .headers
        .iter()
        .fold(Response::json(&error.detail).with_status(error.status), |r, (k, v)| {
            r.with_header(k.clone(), v.clone())
        })
}

fn render_response() -> Callable {
    Callable::builder("render_response")
        .param::<ReturnValue>("return_value")
        .returns::<Response>()
        .sync(|args| {
            let ReturnValue(value) = args.get("return_value")?;
            Ok(Value::new(render_value(&value)?))
        })
}

fn exception_handler() -> Callable {
    Callable::builder("exception_handler")
        .param::<Exception>("exc")
        .returns::<Response>()
        .sync(|args| {
            let exc: Arc<Exception> = args.get("exc")?;
            let Some(error) = exc.0.as_ref() else {
                return Err(Error::configuration("exception handler ran without an exception"));
            };
            if let Some(http) = error.as_http() {
                return Ok(Value::new(http_error_response(http)));
            }
            if let Error::Validation(errors) = error.as_ref() {
                return Ok(Value::new(http_error_response(&HttpError::bad_request(errors.to_detail()))));
            }
            Err(Error::Propagated(Arc::clone(error)))
        })
}

fn error_handler() -> Callable {
    Callable::builder("error_handler")
        .param::<Exception>("exc")
        .param::<Settings>("settings")
        .returns::<Response>()
        .sync(|args| {
            let exc: Arc<Exception> = args.get("exc")?;
            let settings: Arc<Settings> = args.get("settings")?;
            let body = if settings.debug {
                json!({"message": "Server error", "detail": exc.to_string()})
            } else {
                json!("Server error")
            };
            Ok(Value::new(Response::json(&body).with_status(500)))
        })
}

fn serve_schema() -> Callable {
    Callable::builder("serve_schema")
        .doc("Serve the OpenAPI document.")
        .param::<Document>("document")
        .returns::<Response>()
        .sync(|args| {
            let document: Arc<Document> = args.get("document")?;
            let codec = OpenApiCodec;
            Ok(Value::new(
                Response::json(&codec.encode(&document)).with_header("content-type", codec.media_type()),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;

    fn hello() -> Callable {
        Callable::builder("hello")
            .returns::<String>()
            .sync(|_| Ok(Value::new("<h1>hi</h1>".to_string())))
    }

    fn fail() -> Callable {
        Callable::builder("fail").sync(|_| Err(Error::handler(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))))
    }

    fn app(debug: bool) -> App {
        App::builder()
            .settings(Settings::new().debug(debug))
            .route(Route::get("/", hello()).unwrap())
            .route(Route::get("/fail", fail()).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&Value::none()).unwrap().status, 204);
        assert_eq!(
            render_value(&Value::new("x".to_string())).unwrap().header("content-type"),
            Some("text/html; charset=utf-8")
        );
        let json = render_value(&Value::new(vec![1_i64, 2])).unwrap();
        assert_eq!(json.json_body(), Some(json!([1, 2])));

        #[derive(Clone)]
        struct Opaque;
        impl_named!(Opaque);
        assert!(render_value(&Value::new(Opaque)).is_err());
    }

    #[test]
    fn test_string_is_html() {
        let response = app(false).handle(Request::new(Method::Get, "/"));
        assert_eq!(response.status, 200);
        assert_eq!(response.text_body(), Some("<h1>hi</h1>"));
    }

    #[test]
    fn test_not_found_and_method_not_allowed() {
        let app = app(false);
        let response = app.handle(Request::new(Method::Get, "/missing"));
        assert_eq!(response.status, 404);
        let response = app.handle(Request::new(Method::Post, "/"));
        assert_eq!(response.status, 405);
        assert_eq!(response.json_body(), Some(json!("Method not allowed")));
    }

    #[test]
    fn test_server_error_hides_detail_unless_debug() {
        let response = app(false).handle(Request::new(Method::Get, "/fail"));
        assert_eq!(response.status, 500);
        assert_eq!(response.json_body(), Some(json!("Server error")));

        let response = app(true).handle(Request::new(Method::Get, "/fail"));
        assert_eq!(response.status, 500);
        let body = response.json_body().unwrap();
        assert!(body["detail"].as_str().unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_payload_too_large() {
        let app = App::builder()
            .settings(Settings::new().max_body_size(4))
            .route(Route::get("/", hello()).unwrap())
            .build()
            .unwrap();
        let response = app.handle(Request::new(Method::Get, "/").with_body("0123456789"));
        assert_eq!(response.status, 413);
    }

    #[test]
    fn test_schema_route_is_undocumented() {
        let app = App::builder()
            .settings(Settings::new().schema_url("/schema/").title("Demo"))
            .route(Route::get("/", hello()).unwrap())
            .build()
            .unwrap();
        assert_eq!(app.document().walk_links().len(), 1);

        let response = app.handle(Request::new(Method::Get, "/schema/"));
        assert_eq!(response.status, 200);
        let body = response.json_body().unwrap();
        assert_eq!(body["info"]["title"], "Demo");
        assert!(body["paths"]["/"]["get"].is_object());
    }

    #[test]
    fn test_unresolvable_parameter_fails_build() {
        #[derive(Clone)]
        struct Unknown;
        impl_named!(Unknown);

        let handler = Callable::builder("needs_unknown")
            .param::<Unknown>("thing")
            .sync(|_| Ok(Value::none()));
        let err = App::builder()
            .route(Route::get("/", handler).unwrap())
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
