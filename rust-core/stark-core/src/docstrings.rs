//! # Doc String Parsing
//!
//! Splits a callable's doc string into the pieces a link needs: the first
//! line becomes the title, the following paragraph the description, and
//! parameter blocks become field descriptions.
//!
//! Two parameter styles are recognized:
//!
//! ```text
//! :param limit: Maximum number of items.
//!
//! # Arguments
//!
//! * `limit` - Maximum number of items.
//! ```

use std::collections::HashMap;

/// Parsed doc string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    /// First line
    pub short_description: String,
    /// Text between the first line and the parameter blocks
    pub long_description: String,
    /// Parameter name to description
    pub params: HashMap<String, String>,
}

/// Remove common indentation and surrounding blank lines
///
/// The first line is stripped on its own and does not count towards the
/// common indentation.
#[must_use]
pub fn trim(doc: &str) -> String {
    let expanded = doc.replace('\t', "    ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut trimmed = vec![first.trim().to_string()];
    trimmed.extend(
        rest.iter()
            .map(|line| line.get(indent..).unwrap_or("").trim_end().to_string()),
    );
    while trimmed.last().is_some_and(String::is_empty) {
        trimmed.pop();
    }
    while trimmed.first().is_some_and(String::is_empty) {
        trimmed.remove(0);
    }
    trimmed.join("\n")
}

/// Parse a doc string
#[must_use]
pub fn parse(doc: &str) -> Docstring {
    let doc = trim(doc);
    if doc.is_empty() {
        return Docstring::default();
    }
    let (short, rest) = doc.split_once('\n').unwrap_or((doc.as_str(), ""));
    let rest = rest.trim();

    let params_start = [":param", ":returns", ":return", ":raises", "# Arguments"]
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min();
    let (long, params_text) = match params_start {
        Some(at) => (rest[..at].trim_end(), &rest[at..]),
        None => (rest, ""),
    };

    Docstring {
        short_description: short.to_string(),
        long_description: long.to_string(),
        params: parse_params(params_text),
    }
}

fn parse_params(text: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    let mut flush = |current: &mut Option<(String, Vec<String>)>| {
        if let Some((name, lines)) = current.take() {
            params.insert(name, trim(&lines.join("\n")));
        }
    };

    for line in text.lines() {
        let stripped = line.trim();
        if let Some(rest) = stripped.strip_prefix(":param ") {
            flush(&mut current);
            if let Some((name, doc)) = rest.split_once(':') {
                current = Some((name.trim().to_string(), vec![doc.trim().to_string()]));
            }
        } else if let Some(rest) = stripped.strip_prefix("* `") {
            flush(&mut current);
            if let Some((name, doc)) = rest.split_once('`') {
                let doc = doc.trim_start().trim_start_matches('-').trim();
                current = Some((name.to_string(), vec![doc.to_string()]));
            }
        } else if stripped.starts_with(':') || stripped.starts_with('#') {
            flush(&mut current);
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line.to_string());
        }
    }
    flush(&mut current);
    params
}
