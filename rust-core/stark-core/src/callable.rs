//! # Callables
//!
//! Introspectable functions: a name, a doc string, ordered parameters, a
//! return tag and a synchronous or asynchronous body.
//!
//! Handlers, component resolvers and event hooks are all callables. They are
//! usually produced by the `#[handler]` attribute, which reads the Rust fn
//! signature, but can be assembled by hand with [`Callable::builder`].
//!
//! ```ignore
//! let greet = Callable::builder("greet")
//!     .param::<String>("name")
//!     .returns::<String>()
//!     .sync(|args| {
//!         let name: String = args.get("name")?;
//!         Ok(Value::new(format!("Hello, {name}")))
//!     });
//! ```

use crate::error::{Error, Result};
use crate::state::{Args, Value};
use crate::types::{Annotated, TypeTag};
use serde_json::Value as Json;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Boxed future returned by asynchronous callables
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type SyncBody = dyn Fn(Args) -> Result<Value> + Send + Sync;
type AsyncBody = dyn Fn(Args) -> BoxFuture<Result<Value>> + Send + Sync;

/// A declared parameter: name, type tag, default and description
///
/// `default` is `None` when the parameter has no default, and
/// `Some(Json::Null)` for an explicit null default. Equality ignores the
/// description.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub annotation: TypeTag,
    /// Default value
    pub default: Option<Json>,
    /// Human readable description
    pub description: String,
}

impl Parameter {
    /// Create a parameter without default or description
    pub fn new(name: impl Into<String>, annotation: TypeTag) -> Self {
        Self {
            name: name.into(),
            annotation,
            default: None,
            description: String::new(),
        }
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether a default value was declared
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.annotation == other.annotation
            && self.default == other.default
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.annotation)?;
        if let Some(default) = &self.default {
            write!(f, " = {default}")?;
        }
        Ok(())
    }
}

impl Annotated for Parameter {
    fn annotation() -> TypeTag {
        TypeTag::Parameter
    }
}

/// Process-unique callable identity, shared by clones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(u64);

impl CallableId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
enum Body {
    Sync(Arc<SyncBody>),
    Async(Arc<AsyncBody>),
}

struct Inner {
    id: CallableId,
    name: String,
    doc: Option<String>,
    parameters: Vec<Parameter>,
    returns: TypeTag,
    body: Body,
}

/// An introspectable function
#[derive(Clone)]
pub struct Callable {
    inner: Arc<Inner>,
}

impl Callable {
    /// Start building a callable
    pub fn builder(name: impl Into<String>) -> CallableBuilder {
        CallableBuilder {
            name: name.into(),
            doc: None,
            parameters: Vec::new(),
            returns: TypeTag::Empty,
        }
    }

    /// Identity used for plan caching
    #[must_use]
    pub fn id(&self) -> CallableId {
        self.inner.id
    }

    /// Function name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Doc string
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.inner.doc.as_deref()
    }

    /// Declared parameters, in order
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.inner.parameters
    }

    /// Return type tag (`TypeTag::Empty` when not declared)
    #[must_use]
    pub fn returns(&self) -> &TypeTag {
        &self.inner.returns
    }

    /// Whether the body suspends
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.inner.body, Body::Async(_))
    }

    /// Whether any parameter is declared with the given tag
    #[must_use]
    pub fn takes(&self, tag: &TypeTag) -> bool {
        self.inner.parameters.iter().any(|p| &p.annotation == tag)
    }

    /// Invoke a synchronous callable
    ///
    /// # Errors
    ///
    /// Propagates the body's error, or returns `Error::Configuration` if the
    /// callable is asynchronous.
    pub fn call(&self, args: Args) -> Result<Value> {
        match &self.inner.body {
            Body::Sync(body) => body(args),
            Body::Async(_) => Err(Error::configuration(format!(
                "Function \"{}\" is async and must be run asynchronously.",
                self.name()
            ))),
        }
    }

    /// Invoke the callable, awaiting it if asynchronous
    pub fn call_async(&self, args: Args) -> BoxFuture<Result<Value>> {
        match &self.inner.body {
            Body::Sync(body) => Box::pin(std::future::ready(body(args))),
            Body::Async(body) => body(args),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("parameters", &self.inner.parameters)
            .field("returns", &self.inner.returns)
            .field("async", &self.is_async())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Callable {}

/// Builder for [`Callable`]
#[derive(Debug)]
#[must_use]
pub struct CallableBuilder {
    name: String,
    doc: Option<String>,
    parameters: Vec<Parameter>,
    returns: TypeTag,
}

impl CallableBuilder {
    /// Set the doc string
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        let doc = doc.into();
        self.doc = (!doc.trim().is_empty()).then_some(doc);
        self
    }

    /// Add a parameter of type `T`
    pub fn param<T: Annotated>(self, name: impl Into<String>) -> Self {
        self.parameter(Parameter::new(name, T::annotation()))
    }

    /// Add a parameter of type `T` with a default value
    pub fn param_default<T: Annotated>(self, name: impl Into<String>, default: Json) -> Self {
        self.parameter(Parameter::new(name, T::annotation()).with_default(default))
    }

    /// Add a parameter with an explicit tag
    pub fn param_tag(self, name: impl Into<String>, annotation: TypeTag) -> Self {
        self.parameter(Parameter::new(name, annotation))
    }

    /// Add a fully specified parameter
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare the return type
    pub fn returns<T: Annotated>(self) -> Self {
        self.returns_tag(T::annotation())
    }

    /// Declare the return tag
    pub fn returns_tag(mut self, returns: TypeTag) -> Self {
        self.returns = returns;
        self
    }

    /// Finish with a synchronous body
    pub fn sync<F>(self, body: F) -> Callable
    where
        F: Fn(Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.finish(Body::Sync(Arc::new(body)))
    }

    /// Finish with an asynchronous body
    pub fn asynchronous<F, Fut>(self, body: F) -> Callable
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.finish(Body::Async(Arc::new(move |args| {
            Box::pin(body(args)) as BoxFuture<Result<Value>>
        })))
    }

    fn finish(self, body: Body) -> Callable {
        Callable {
            inner: Arc::new(Inner {
                id: CallableId::next(),
                name: self.name,
                doc: self.doc,
                parameters: self.parameters,
                returns: self.returns,
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add() -> Callable {
        Callable::builder("add")
            .doc("Add two numbers.")
            .param::<i64>("a")
            .param_default::<i64>("b", json!(1))
            .returns::<i64>()
            .sync(|args| {
                let a: i64 = args.get("a")?;
                let b: i64 = args.get("b")?;
                Ok(Value::new(a + b))
            })
    }

    #[test]
    fn test_builder_introspection() {
        let func = add();
        assert_eq!(func.name(), "add");
        assert_eq!(func.doc(), Some("Add two numbers."));
        assert_eq!(func.parameters().len(), 2);
        assert_eq!(func.parameters()[1].default, Some(json!(1)));
        assert_eq!(func.returns(), &TypeTag::Int);
        assert!(!func.is_async());
    }

    #[test]
    fn test_sync_call() {
        let args = Args::new()
            .with("a", Value::new(2i64))
            .with("b", Value::new(3i64));
        let out = add().call(args).unwrap();
        assert_eq!(out.extract::<i64>(), Some(5));
    }

    #[test]
    fn test_identity_shared_by_clones() {
        let func = add();
        let clone = func.clone();
        assert_eq!(func.id(), clone.id());
        assert_ne!(func.id(), add().id());
        assert_eq!(func, clone);
    }

    #[test]
    fn test_async_callable_rejects_sync_call() {
        let func = Callable::builder("later")
            .returns::<i64>()
            .asynchronous(|_args| async { Ok(Value::new(1i64)) });
        assert!(func.is_async());
        assert!(func.call(Args::new()).is_err());
    }

    #[test]
    fn test_parameter_equality_ignores_description() {
        let a = Parameter::new("limit", TypeTag::Int).with_description("Page size");
        let b = Parameter::new("limit", TypeTag::Int);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_default(json!(10)));
        assert_eq!(b.with_default(json!(10)).to_string(), "limit: int = 10");
    }
}
