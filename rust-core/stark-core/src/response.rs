//! # HTTP Response
//!
//! The value the pipeline produces for every request.

use crate::error::{Error, Result};
use hyper::body::Bytes;
use serde_json::Value as Json;

/// An HTTP response with a fully buffered body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// Body bytes
    pub body: Bytes,
}

impl Response {
    /// Response with a status, optional content type and body
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        let headers = content_type
            .map(|ct| vec![("content-type".to_string(), ct.to_string())])
            .unwrap_or_default();
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// `200` JSON response
    #[must_use]
    pub fn json(value: &Json) -> Self {
        Self::new(200, Some("application/json"), value.to_string())
    }

    /// `200` HTML response
    pub fn html(content: impl Into<String>) -> Self {
        Self::new(200, Some("text/html; charset=utf-8"), content.into())
    }

    /// `200` plain text response
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(200, Some("text/plain; charset=utf-8"), content.into())
    }

    /// `204 No Content`
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, None, Bytes::new())
    }

    /// Override the status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value with this name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as JSON, if it is JSON
    #[must_use]
    pub fn json_body(&self) -> Option<Json> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Body as UTF-8 text
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Convert to a hyper response
    ///
    /// # Errors
    ///
    /// Returns `Error::Handler` if the status or a header is not valid HTTP.
    pub fn into_http(self) -> Result<hyper::Response<Bytes>> {
        let mut builder = hyper::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(self.body).map_err(Error::handler)
    }
}

crate::types::impl_named!(Response);
