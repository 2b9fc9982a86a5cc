//! # Error Handling
//!
//! Centralized error types for Stark core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Two families live here:
//!
//! - Build-time failures (`Configuration`, `CircularDependency`, ...) raised
//!   while routes are constructed or execution plans are computed.
//! - Request-time failures (`Http`) raised by components and handlers, which
//!   the application's exception handler turns into responses.

use crate::validation::ValidationErrors;
use serde_json::Value as Json;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Stark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Stark runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid wiring detected while building routes or plans
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A component depends, transitively, on its own identity
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// Identities forming the cycle; first and last are the same
        cycle: Vec<String>,
    },

    /// A step asked for a state key that no earlier step produced
    #[error("No value in state for key \"{key}\"")]
    MissingState {
        /// The missing state key
        key: String,
    },

    /// A callable received an argument it could not extract
    #[error("Invalid argument \"{name}\": {reason}")]
    Argument {
        /// Argument name
        name: String,
        /// Why extraction failed
        reason: String,
    },

    /// An HTTP-level error meant to become a response
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Schema validation failed outside of a request component
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// `reverse_url` was asked for an unknown route or missing parameters
    #[error("No reverse match for route \"{name}\": {reason}")]
    NoReverseMatch {
        /// Route name
        name: String,
        /// Reason for the failure
        reason: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Payload decoding failed
    #[error("{format} parse error: {reason}")]
    Parse {
        /// Format being decoded ("JSON", "form", ...)
        format: &'static str,
        /// Decoder message
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error re-raised from a previous pipeline run
    #[error(transparent)]
    Propagated(Arc<Error>),

    /// Any other failure raised by a handler or component
    #[error("Handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an arbitrary handler error
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(error))
    }

    /// Whether this error was raised while building routes or plans
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_)
            | Self::CircularDependency { .. }
            | Self::InvalidRoutePattern { .. } => true,
            Self::Propagated(inner) => inner.is_configuration(),
            _ => false,
        }
    }

    /// The HTTP error carried by this error, looking through re-raises
    #[must_use]
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(http) => Some(http),
            Self::Propagated(inner) => inner.as_http(),
            _ => None,
        }
    }
}

/// HTTP error with a status code and structured detail
///
/// The detail is either a plain message or a field-indexed map produced by
/// schema validation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("HTTP {status}: {detail}")]
pub struct HttpError {
    /// HTTP status code
    pub status: u16,
    /// Message or field-indexed error map
    pub detail: Json,
    /// Extra response headers
    pub headers: Vec<(String, String)>,
}

impl HttpError {
    /// Create an error with an explicit status and detail
    pub fn new(status: u16, detail: impl Into<Json>) -> Self {
        Self {
            status,
            detail: detail.into(),
            headers: Vec::new(),
        }
    }

    /// Add a response header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 302 Found with a `Location` header
    pub fn found(location: impl Into<String>) -> Self {
        Self::new(302, "Found").with_header("Location", location)
    }

    /// 400 Bad Request
    pub fn bad_request(detail: impl Into<Json>) -> Self {
        Self::new(400, detail)
    }

    /// 403 Forbidden
    pub fn forbidden(detail: impl Into<Json>) -> Self {
        Self::new(403, detail)
    }

    /// 404 Not Found
    pub fn not_found(detail: impl Into<Json>) -> Self {
        Self::new(404, detail)
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method not allowed")
    }

    /// 406 Not Acceptable
    pub fn not_acceptable() -> Self {
        Self::new(406, "Could not satisfy the request Accept header")
    }

    /// 413 Payload Too Large
    pub fn payload_too_large(limit: usize, actual: usize) -> Self {
        Self::new(
            413,
            format!("Payload too large: limit={limit} bytes, received={actual} bytes"),
        )
    }

    /// 415 Unsupported Media Type
    pub fn unsupported_media_type() -> Self {
        Self::new(415, "Unsupported Content-Type header in request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = Error::configuration("No component able to handle parameter \"db\"");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("\"db\""));
    }

    #[test]
    fn test_circular_dependency_message() {
        let err = Error::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_http_error_through_propagation() {
        let err = Error::Propagated(Arc::new(Error::Http(HttpError::not_found("Not found"))));
        assert_eq!(err.as_http().map(|h| h.status), Some(404));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_found_sets_location() {
        let err = HttpError::found("/login");
        assert_eq!(err.status, 302);
        assert_eq!(err.headers, vec![("Location".to_string(), "/login".to_string())]);
    }

    #[test]
    fn test_payload_too_large() {
        let err = HttpError::payload_too_large(10, 20);
        assert_eq!(err.status, 413);
        assert!(err.to_string().contains("limit=10"));
    }
}
