//! # Validation Errors
//!
//! Structured errors produced by `Schema::validate`.
//!
//! Errors are keyed by field path (`"owner.name"`, `"tags.2"`) so that a
//! request component can turn them into a field-indexed response detail.

use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is invalid type
    InvalidType,
    /// Value doesn't match the expected format
    InvalidFormat,
    /// Value is null where null is not allowed
    NotNull,
    /// Property is not declared on a strict object
    NotAllowed,
    /// Array length doesn't match a fixed-length array
    InvalidLength,
    /// Custom validation failed
    Custom,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path (e.g., "email", "user.address.city"); empty for the root value
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "This field is required.", ValidationCode::Required)
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        Self::new(
            field,
            format!("Must be {expected}."),
            ValidationCode::InvalidType,
        )
    }

    /// Create an "invalid format" error
    pub fn invalid_format(field: impl Into<String>, format: &str) -> Self {
        Self::new(
            field,
            format!("Must be a valid {format}."),
            ValidationCode::InvalidFormat,
        )
    }

    /// Create a "may not be null" error
    pub fn not_null(field: impl Into<String>) -> Self {
        Self::new(field, "May not be null.", ValidationCode::NotNull)
    }

    /// Create an "invalid property name" error
    pub fn not_allowed(field: impl Into<String>) -> Self {
        Self::new(field, "Invalid property name.", ValidationCode::NotAllowed)
    }

    /// Prefix the field path with a parent segment
    #[must_use]
    pub fn nested_under(mut self, parent: &str) -> Self {
        if parent.is_empty() {
            return self;
        }
        self.field = if self.field.is_empty() {
            parent.to_string()
        } else {
            format!("{parent}.{}", self.field)
        };
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding a single error
    #[must_use]
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Merge another collection, nesting its fields under `parent`
    pub fn extend_nested(&mut self, parent: &str, other: Self) {
        self.errors
            .extend(other.errors.into_iter().map(|e| e.nested_under(parent)));
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Field-indexed message map used as an HTTP error detail
    ///
    /// An error on the root value (empty field path) collapses the detail to
    /// its plain message. Otherwise the first message per field wins.
    #[must_use]
    pub fn to_detail(&self) -> Json {
        if let Some(root) = self.errors.iter().find(|e| e.field.is_empty()) {
            return Json::String(root.message.clone());
        }
        let mut map = Map::new();
        for error in &self.errors {
            map.entry(error.field.clone())
                .or_insert_with(|| Json::String(error.message.clone()));
        }
        Json::Object(map)
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_under_root_error() {
        let error = FieldError::invalid_format("", "date").nested_under("tags.2");
        assert_eq!(error.field, "tags.2");
        assert_eq!(error.code, ValidationCode::InvalidFormat);
        assert_eq!(FieldError::not_allowed("x").nested_under("").field, "x");
    }

    #[test]
    fn test_to_detail_is_field_indexed() {
        let mut errors = ValidationErrors::new();
        errors.add_required("email");
        errors.add(FieldError::invalid_type("age", "an integer"));

        assert_eq!(
            errors.to_detail(),
            json!({"email": "This field is required.", "age": "Must be an integer."})
        );
    }

    #[test]
    fn test_to_detail_root_error() {
        let errors = ValidationErrors::single(FieldError::invalid_type("", "an object"));
        assert_eq!(errors.to_detail(), json!("Must be an object."));
    }

    #[test]
    fn test_extend_nested() {
        let mut inner = ValidationErrors::new();
        inner.add_required("city");
        inner.add(FieldError::not_null(""));

        let mut outer = ValidationErrors::new();
        outer.extend_nested("address", inner);

        let fields: Vec<&str> = outer.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["address.city", "address"]);
    }

    #[test]
    fn test_first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldError::not_null("owner"));
        errors.add(FieldError::invalid_type("owner", "an object"));

        assert_eq!(errors.by_field().get("owner").map(Vec::len), Some(2));
        assert_eq!(errors.to_detail(), json!({"owner": "May not be null."}));
    }

    #[test]
    fn test_display() {
        let errors = ValidationErrors::single(FieldError::required("email"));
        assert_eq!(errors.to_string(), "email: This field is required.");
    }
}
