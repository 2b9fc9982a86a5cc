//! # Resolution State
//!
//! Type-erased values and the per-run state map that execution plans read
//! from and write to.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only handles value storage and retrieval
//! - **O**: Extensible via `Annotated` for any type
//! - **D**: Callables depend on `Args`, not on the state layout
//!
//! A [`State`] lives for exactly one request (or one explicit `run`). It is
//! seeded with initial bindings and grows as plan steps store their outputs.

use crate::error::{Error, Result};
use crate::types::Annotated;
use serde_json::Value as Json;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type RenderFn = fn(&(dyn Any + Send + Sync)) -> Option<Json>;

fn render_json<T: Annotated>(value: &(dyn Any + Send + Sync)) -> Option<Json> {
    value.downcast_ref::<T>().and_then(Annotated::to_json)
}

fn render_nothing(_value: &(dyn Any + Send + Sync)) -> Option<Json> {
    None
}

/// Cheaply clonable, type-erased value
///
/// Keeps the stored type's name for diagnostics and a JSON renderer so that
/// return values can be serialized without knowing their type.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    render: RenderFn,
}

impl Value {
    /// Wrap an annotated value
    pub fn new<T: Annotated>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already shared annotated value without copying it
    pub fn from_arc<T: Annotated>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
            render: render_json::<T>,
        }
    }

    /// Wrap a value that has no annotation and no JSON form
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            render: render_nothing,
        }
    }

    /// The unit value
    #[must_use]
    pub fn none() -> Self {
        Self::new(())
    }

    /// Whether this value is unit or renders as JSON `null`
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.inner.is::<()>() || matches!(self.to_json(), Some(Json::Null))
    }

    /// Name of the stored type
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the stored value has type `T`
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the stored value as `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Share the stored value as `Arc<T>`
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Extract an owned `T`, converting from JSON where needed
    #[must_use]
    pub fn extract<T: Annotated>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Render as JSON, if the stored type supports it
    #[must_use]
    pub fn to_json(&self) -> Option<Json> {
        (self.render)(self.inner.as_ref())
    }

    /// Whether two values share the same allocation
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Some(json) => write!(f, "Value({}: {json})", self.type_name),
            None => write!(f, "Value({})", self.type_name),
        }
    }
}

/// Per-run state map from string keys to values
#[derive(Debug, Clone, Default)]
pub struct State {
    data: HashMap<String, Value>,
}

impl State {
    /// Create a new empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, overwriting any existing value with the same key
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Store an annotated value
    pub fn set<T: Annotated>(&mut self, key: impl Into<String>, value: T) {
        self.insert(key, Value::new(value));
    }

    /// Get a value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a typed value by key
    #[must_use]
    pub fn get_as<T: Annotated>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(Value::extract)
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Iterate over the stored keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Get the number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if state is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Named inputs handed to a callable body
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, Value)>,
}

impl Args {
    /// Create an empty argument set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    /// Builder-style variant of [`Args::insert`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Raw argument value
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Typed argument value
    ///
    /// # Errors
    ///
    /// Returns `Error::Argument` if the argument is missing or its stored
    /// type cannot be converted to `T`.
    pub fn get<T: Annotated>(&self, name: &str) -> Result<T> {
        let value = self.value(name).ok_or_else(|| Error::Argument {
            name: name.to_string(),
            reason: "argument was not provided".to_string(),
        })?;
        value.extract::<T>().ok_or_else(|| Error::Argument {
            name: name.to_string(),
            reason: format!(
                "expected {}, found {}",
                std::any::type_name::<T>(),
                value.type_name()
            ),
        })
    }

    /// Number of arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_set_get() {
        let mut state = State::new();
        state.set("count", 42i64);
        state.set("name", "test".to_string());

        assert_eq!(state.get_as::<i64>("count"), Some(42));
        assert_eq!(state.get_as::<String>("name"), Some("test".to_string()));
    }

    #[test]
    fn test_state_type_mismatch() {
        let mut state = State::new();
        state.set("count", 42i64);

        assert_eq!(state.get_as::<String>("count"), None);
    }

    #[test]
    fn test_state_overwrite_and_remove() {
        let mut state = State::new();
        state.set("value", 1i64);
        state.set("value", 2i64);
        assert_eq!(state.get_as::<i64>("value"), Some(2));
        assert_eq!(state.len(), 1);

        assert!(state.remove("value").is_some());
        assert!(!state.contains("value"));
        assert!(state.is_empty());
    }

    #[test]
    fn test_value_render_and_none() {
        assert_eq!(Value::new(3i64).to_json(), Some(json!(3)));
        assert!(Value::none().is_none());
        assert!(Value::new(Option::<i64>::None).is_none());
        assert!(Value::new(json!(null)).is_none());
        assert!(!Value::new(0i64).is_none());
        assert_eq!(Value::opaque(std::time::Duration::from_secs(1)).to_json(), None);
    }

    #[test]
    fn test_value_downcast_arc_shares_allocation() {
        let shared = Arc::new("shared".to_string());
        let value = Value::from_arc(Arc::clone(&shared));
        let back = value.downcast_arc::<String>().unwrap();
        assert!(Arc::ptr_eq(&shared, &back));
        assert!(value.clone().ptr_eq(&value));
    }

    #[test]
    fn test_args_get() {
        let args = Args::new()
            .with("limit", Value::new(json!(10)))
            .with("name", Value::new("x".to_string()));

        assert_eq!(args.get::<i64>("limit").unwrap(), 10);
        assert_eq!(args.get::<String>("name").unwrap(), "x");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_args_errors_name_argument() {
        let args = Args::new().with("name", Value::new("x".to_string()));

        let missing = args.get::<i64>("limit").unwrap_err();
        assert!(missing.to_string().contains("\"limit\""));

        let mismatch = args.get::<i64>("name").unwrap_err();
        assert!(mismatch.to_string().contains("expected i64"));
    }
}
