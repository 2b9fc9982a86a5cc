//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json, responses and documents are
//! serialized with `serde_json`.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only handles JSON serialization/deserialization
//! - **O**: Extensible via serde traits
//! - **D**: Depends on serde abstractions, not concrete parsers

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the bytes are copied first.
///
/// # Errors
///
/// Returns `Error::Parse` if the bytes are not valid JSON for `T`.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut buffer = bytes.to_vec();
    simd_json::from_slice(&mut buffer).map_err(|e| Error::Parse {
        format: "json",
        reason: e.to_string(),
    })
}

/// Parse a JSON string to a typed value
///
/// # Errors
///
/// Returns `Error::Parse` if the string is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    parse_json_bytes(json_str.as_bytes())
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize a value to a pretty-printed JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
