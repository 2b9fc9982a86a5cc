//! # Settings
//!
//! Application configuration. Deserializable from any serde format; where
//! it is loaded from is up to the embedding program.

use serde::Deserialize;

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Include error details in 500 responses
    pub debug: bool,
    /// URL serving the OpenAPI document, if any
    pub schema_url: Option<String>,
    /// API title
    pub title: String,
    /// API description
    pub description: String,
    /// API version
    pub version: String,
    /// Public server URL
    pub url: String,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            schema_url: None,
            title: "API".to_string(),
            description: String::new(),
            version: "0.1.0".to_string(),
            url: String::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl Settings {
    /// Default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Serve the OpenAPI document at `url`
    #[must_use]
    pub fn schema_url(mut self, url: impl Into<String>) -> Self {
        self.schema_url = Some(url.into());
        self
    }

    /// Set the API title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the API description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the API version
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the public server URL
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request body limit
    #[must_use]
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }
}

crate::types::impl_named!(Settings);
