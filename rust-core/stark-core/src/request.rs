//! # HTTP Request
//!
//! Transport-neutral request value and the typed views handlers can ask for.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Request only holds request data, not response
//! - **O**: New views are new `Annotated` newtypes, the request is unchanged
//! - **D**: Built from `hyper::Request<Bytes>`, no server types leak in

use crate::error::{Error, Result};
use crate::router::Method;
use crate::types::impl_named;
use hyper::body::Bytes;
use hyper::HeaderMap;
use std::collections::HashMap;

/// A fully read HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query pairs, in order, duplicates kept
    query: Vec<(String, String)>,
    /// Request headers
    headers: HeaderMap,
    /// Request body
    body: Bytes,
}

impl Request {
    /// Create a request from a path that may carry a query string
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        let query = parse_query_string(query_string.as_deref());
        Self {
            method,
            path,
            query_string,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set or override a header, ignoring invalid names or values
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and its content type
    #[must_use]
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// Convert a hyper request whose body has already been collected
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for methods the router does not support.
    pub fn from_http(request: hyper::Request<Bytes>) -> Result<Self> {
        let (parts, body) = request.into_parts();
        let method = Method::try_from(&parts.method)?;
        let query_string = parts.uri.query().map(String::from);
        Ok(Self {
            method,
            path: parts.uri.path().to_string(),
            query: parse_query_string(query_string.as_deref()),
            query_string,
            headers: parts.headers,
            body,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Parsed query pairs in request order
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Request body bytes
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Content type without parameters, lower-cased
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase()
        })
    }
}

impl TryFrom<&hyper::Method> for Method {
    type Error = Error;

    fn try_from(method: &hyper::Method) -> Result<Self> {
        method.as_str().parse()
    }
}

/// Raw path parameters captured by the router
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub HashMap<String, String>);

impl PathParams {
    /// Value of a captured parameter
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Multi-valued query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(pub Vec<(String, String)>);

impl QueryParams {
    /// First value for a key
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value for a key, in order
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// Request headers
#[derive(Debug, Clone, Default)]
pub struct Headers(pub HeaderMap);

impl Headers {
    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Raw request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(pub Bytes);

impl_named!(Request, PathParams, QueryParams, Headers, Body);

/// Parse a query string into ordered pairs
///
/// Handles URL decoding and keeps duplicate keys.
pub(crate) fn parse_query_string(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// URL decoding of `+` and `%XX` escapes, UTF-8 aware
pub(crate) fn url_decode(s: &str) -> String {
    percent_decode(s, true)
}

/// Decode a path segment: `+` stays literal
pub(crate) fn path_decode(s: &str) -> String {
    percent_decode(s, false)
}

fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => decoded.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    decoded.push(byte);
                    i += 2;
                } else {
                    decoded.push(b'%');
                }
            }
            b => decoded.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
