//! # Event Hooks
//!
//! Callables run around every non-standalone request. Hooks are planned by
//! the resolver like handlers, so they declare what they need (`Request`,
//! `Response`, `Exception`, any component) as parameters.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Each hook has a single responsibility
//! - **O**: Extensible via the `EventHook` trait
//! - **D**: The application depends on the trait, not on concrete hooks
//!
//! `on_request` hooks run in registration order before the handler;
//! `on_response` and `on_error` hooks run in reverse order. A hook that
//! returns a `Response` replaces the response being built.

use crate::app::Exception;
use crate::callable::Callable;
use crate::request::Request;
use crate::response::Response;
use crate::state::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Hook into the request lifecycle
pub trait EventHook: Send + Sync {
    /// Hook name for diagnostics
    fn name(&self) -> &'static str;

    /// Callable run before the handler
    fn on_request(&self) -> Option<Callable> {
        None
    }

    /// Callable run after the response is rendered
    fn on_response(&self) -> Option<Callable> {
        None
    }

    /// Callable run when the error response itself could not be produced
    fn on_error(&self) -> Option<Callable> {
        None
    }
}

/// Hook callables collected once, in execution order
#[derive(Clone, Default)]
pub struct EventHooks {
    names: Vec<&'static str>,
    on_request: Vec<Callable>,
    on_response: Vec<Callable>,
    on_error: Vec<Callable>,
}

impl EventHooks {
    /// Collect the callables of every hook
    #[must_use]
    pub fn new(hooks: &[Arc<dyn EventHook>]) -> Self {
        Self {
            names: hooks.iter().map(|h| h.name()).collect(),
            on_request: hooks.iter().filter_map(|h| h.on_request()).collect(),
            on_response: hooks.iter().rev().filter_map(|h| h.on_response()).collect(),
            on_error: hooks.iter().rev().filter_map(|h| h.on_error()).collect(),
        }
    }

    /// Callables run before the handler
    #[must_use]
    pub fn on_request(&self) -> &[Callable] {
        &self.on_request
    }

    /// Callables run after the response, reverse registration order
    #[must_use]
    pub fn on_response(&self) -> &[Callable] {
        &self.on_response
    }

    /// Callables run on unrecoverable errors, reverse registration order
    #[must_use]
    pub fn on_error(&self) -> &[Callable] {
        &self.on_error
    }

    /// Number of hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no hooks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.names).finish()
    }
}

/// Logs every request and response, and unrecoverable errors
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHook;

impl LoggingHook {
    /// Create a new logging hook
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventHook for LoggingHook {
    fn name(&self) -> &'static str {
        "LoggingHook"
    }

    fn on_request(&self) -> Option<Callable> {
        let callable = Callable::builder("log_request")
            .param::<Request>("request")
            .sync(|args| {
                let request: Arc<Request> = args.get("request")?;
                let request_id = request.header("x-request-id").unwrap_or("-");
                info!(
                    method = %request.method,
                    path = %request.path,
                    request_id = %request_id,
                    "Request received"
                );
                Ok(Value::none())
            });
        Some(callable)
    }

    fn on_response(&self) -> Option<Callable> {
        let callable = Callable::builder("log_response")
            .param::<Request>("request")
            .param::<Response>("response")
            .sync(|args| {
                let request: Arc<Request> = args.get("request")?;
                let response: Arc<Response> = args.get("response")?;
                info!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    "Response sent"
                );
                Ok(Value::none())
            });
        Some(callable)
    }

    fn on_error(&self) -> Option<Callable> {
        let callable = Callable::builder("log_error")
            .param::<Request>("request")
            .param::<Exception>("exc")
            .sync(|args| {
                let request: Arc<Request> = args.get("request")?;
                let exc: Arc<Exception> = args.get("exc")?;
                error!(
                    method = %request.method,
                    path = %request.path,
                    error = %exc,
                    "Request failed"
                );
                Ok(Value::none())
            });
        Some(callable)
    }
}

/// Adds Cross-Origin Resource Sharing headers to every response
#[derive(Debug, Clone)]
pub struct CorsHook {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsHook {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsHook {
    /// Create a CORS hook with permissive defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set allowed methods
    #[must_use]
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    /// Set allowed headers
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// The Access-Control-Allow-Origin header value
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl EventHook for CorsHook {
    fn name(&self) -> &'static str {
        "CorsHook"
    }

    fn on_response(&self) -> Option<Callable> {
        let cors = self.clone();
        let callable = Callable::builder("add_cors_headers")
            .param::<Response>("response")
            .returns::<Response>()
            .sync(move |args| {
                let response: Response = args.get("response")?;
                Ok(Value::new(
                    response
                        .with_header("Access-Control-Allow-Origin", &cors.allow_origin)
                        .with_header("Access-Control-Allow-Methods", &cors.allow_methods)
                        .with_header("Access-Control-Allow-Headers", &cors.allow_headers),
                ))
            });
        Some(callable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Args;

    #[test]
    fn test_hooks_ordering() {
        let hooks: Vec<Arc<dyn EventHook>> = vec![Arc::new(LoggingHook::new()), Arc::new(CorsHook::new())];
        let hooks = EventHooks::new(&hooks);
        assert_eq!(hooks.len(), 2);

        let request: Vec<&str> = hooks.on_request().iter().map(Callable::name).collect();
        assert_eq!(request, vec!["log_request"]);

        let response: Vec<&str> = hooks.on_response().iter().map(Callable::name).collect();
        assert_eq!(response, vec!["add_cors_headers", "log_response"]);

        assert_eq!(hooks.on_error().len(), 1);
    }

    #[test]
    fn test_empty_hooks() {
        let hooks = EventHooks::default();
        assert!(hooks.is_empty());
        assert!(hooks.on_response().is_empty());
    }

    #[test]
    fn test_cors_hook_adds_headers() {
        let hook = CorsHook::new().allow_origin("https://example.com");
        assert_eq!(hook.origin(), "https://example.com");

        let callable = hook.on_response().unwrap();
        let out = callable
            .call(Args::new().with("response", Value::new(Response::text("ok"))))
            .unwrap();
        let response = out.extract::<Response>().unwrap();
        assert_eq!(
            response.header("access-control-allow-origin"),
            Some("https://example.com")
        );
    }
}
