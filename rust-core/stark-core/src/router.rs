//! # Router
//!
//! Radix-trie based URL dispatch using `matchit`, one trie per HTTP method.
//!
//! ## Features
//!
//! - Path parameter extraction (`/users/{id}`)
//! - Catch-all parameters (`/static/{+path}`)
//! - 404 / 405 distinction
//! - Reverse URL building by route name
//!
//! ## SOLID Principles
//!
//! - **S**: Router only handles matching and reversing, not dispatch
//! - **O**: Includes nest to any depth without changes here
//! - **D**: Works on `RouteItem`s, not on handler types

use crate::error::{Error, HttpError, Result};
use crate::request::{path_decode, PathParams};
use crate::route::{Route, RouteItem};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Upper-case method name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Methods whose inputs are read from the query string
    #[must_use]
    pub fn is_query_method(&self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(Error::Parse {
                format: "method",
                reason: format!("unsupported HTTP method '{other}'"),
            }),
        }
    }
}

crate::types::impl_named!(Method);

/// A registered route with its fully prefixed URL and name
#[derive(Debug)]
struct Entry {
    route: Arc<Route>,
    url: String,
}

/// URL router over a tree of routes and includes
///
/// Route names inside an include are namespaced as `include:route`.
#[derive(Default)]
pub struct Router {
    /// Per-method tries mapping to entry indices
    method_routes: HashMap<Method, MatchitRouter<usize>>,
    entries: Vec<Entry>,
    names: HashMap<String, usize>,
}

impl Router {
    /// Build a router from routes and includes
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if a URL is malformed or two
    /// routes of the same method conflict.
    pub fn new(items: &[RouteItem]) -> Result<Self> {
        let mut router = Self::default();
        router.add_items(items, "", "")?;
        Ok(router)
    }

    fn add_items(&mut self, items: &[RouteItem], prefix: &str, namespace: &str) -> Result<()> {
        for item in items {
            match item {
                RouteItem::Route(route) => {
                    let url = format!("{prefix}{}", route.url());
                    let name = qualify(namespace, route.name());
                    self.add_route(url, name, route.clone())?;
                }
                RouteItem::Include(include) => {
                    let prefix = format!("{prefix}{}", include.url());
                    let namespace = qualify(namespace, include.name());
                    self.add_items(include.routes(), &prefix, &namespace)?;
                }
            }
        }
        Ok(())
    }

    /// Register a single route under a full URL and name
    ///
    /// The first route registered under a name is the one `reverse_url`
    /// builds.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route of the same method.
    pub fn add_route(&mut self, url: String, name: String, route: Route) -> Result<()> {
        let index = self.entries.len();
        let pattern = matchit_pattern(&url);
        self.method_routes
            .entry(route.method())
            .or_insert_with(MatchitRouter::new)
            .insert(pattern, index)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: url.clone(),
                reason: e.to_string(),
            })?;
        self.names.entry(name).or_insert(index);
        self.entries.push(Entry {
            route: Arc::new(route),
            url,
        });
        Ok(())
    }

    /// Match a request path and method
    ///
    /// # Errors
    ///
    /// Returns a 404 `HttpError` if no route matches the path and a 405 if
    /// the path only matches under other methods.
    pub fn lookup(&self, path: &str, method: Method) -> Result<(Arc<Route>, PathParams)> {
        if let Some(matched) = self.method_routes.get(&method).and_then(|r| r.at(path).ok()) {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), path_decode(v)))
                .collect();
            let entry = &self.entries[*matched.value];
            return Ok((Arc::clone(&entry.route), PathParams(params)));
        }
        let other_method_matches = self
            .method_routes
            .iter()
            .any(|(m, r)| *m != method && r.at(path).is_ok());
        if other_method_matches {
            Err(HttpError::method_not_allowed().into())
        } else {
            Err(HttpError::not_found("Not found").into())
        }
    }

    /// Build the URL of a named route
    ///
    /// # Errors
    ///
    /// Returns `Error::NoReverseMatch` if no route has this name or a path
    /// parameter is missing.
    pub fn reverse_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let no_match = |reason: String| Error::NoReverseMatch {
            name: name.to_string(),
            reason,
        };
        let index = self
            .names
            .get(name)
            .ok_or_else(|| no_match("no route with this name".to_string()))?;
        let template = &self.entries[*index].url;

        let mut url = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            url.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| no_match("malformed URL template".to_string()))?;
            let token = &after[..end];
            let key = token.strip_prefix('+').unwrap_or(token);
            let value = params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| *v)
                .ok_or_else(|| no_match(format!("missing parameter \"{key}\"")))?;
            url.push_str(value);
            rest = &after[end + 1..];
        }
        url.push_str(rest);
        Ok(url)
    }

    /// Every registered route, in registration order
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.entries.iter().map(|e| &e.route)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.entries.iter().map(|e| (&e.url, e.route.method())).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}:{name}")
    }
}

/// `{+name}` catch-all tokens become matchit's `{*name}`
fn matchit_pattern(url: &str) -> String {
    url.replace("{+", "{*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::route::Include;
    use crate::state::Value;

    fn handler(name: &str) -> Callable {
        Callable::builder(name).sync(|_| Ok(Value::none()))
    }

    fn router() -> Router {
        let users = Include::new(
            "/users",
            "users",
            vec![
                Route::get("/{user_id}", handler("get_user")).unwrap().into(),
                Route::post("/", handler("create_user")).unwrap().into(),
            ],
        );
        Router::new(&[
            Route::get("/", handler("home")).unwrap().into(),
            Route::get("/static/{+path}", handler("static")).unwrap().into(),
            users.into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_basic_routing() {
        let router = router();
        let (route, params) = router.lookup("/", Method::Get).unwrap();
        assert_eq!(route.name(), "home");
        assert!(params.0.is_empty());

        let (route, _) = router.lookup("/users/", Method::Post).unwrap();
        assert_eq!(route.name(), "create_user");
    }

    #[test]
    fn test_path_parameters() {
        let router = router();
        let (route, params) = router.lookup("/users/42", Method::Get).unwrap();
        assert_eq!(route.name(), "get_user");
        assert_eq!(params.get("user_id"), Some("42"));

        let (_, params) = router.lookup("/static/css/site.css", Method::Get).unwrap();
        assert_eq!(params.get("path"), Some("css/site.css"));
    }

    #[test]
    fn test_path_parameters_are_percent_decoded() {
        let router = router();
        let (_, params) = router.lookup("/static/my%20docs/a+b.txt", Method::Get).unwrap();
        assert_eq!(params.get("path"), Some("my docs/a+b.txt"));

        let (_, params) = router.lookup("/users/caf%C3%A9", Method::Get).unwrap();
        assert_eq!(params.get("user_id"), Some("café"));
    }

    #[test]
    fn test_route_not_found() {
        let err = router().lookup("/nonexistent/a/b", Method::Get).unwrap_err();
        assert_eq!(err.as_http().map(|e| e.status), Some(404));
    }

    #[test]
    fn test_method_not_allowed() {
        let err = router().lookup("/users/42", Method::Delete).unwrap_err();
        assert_eq!(err.as_http().map(|e| e.status), Some(405));
    }

    #[test]
    fn test_reverse_url() {
        let router = router();
        assert_eq!(router.reverse_url("home", &[]).unwrap(), "/");
        assert_eq!(
            router.reverse_url("users:get_user", &[("user_id", "7")]).unwrap(),
            "/users/7"
        );
        assert_eq!(
            router.reverse_url("static", &[("path", "js/app.js")]).unwrap(),
            "/static/js/app.js"
        );
        assert!(matches!(
            router.reverse_url("users:get_user", &[]),
            Err(Error::NoReverseMatch { .. })
        ));
        assert!(router.reverse_url("missing", &[]).is_err());
    }

    #[test]
    fn test_conflicting_routes_rejected() {
        let result = Router::new(&[
            Route::get("/items/{id}", handler("a")).unwrap().into(),
            Route::get("/items/{key}", handler("b")).unwrap().into(),
        ]);
        assert!(matches!(result, Err(Error::InvalidRoutePattern { .. })));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!(Method::Delete.is_query_method());
        assert!(!Method::Post.is_query_method());
        assert!("BREW".parse::<Method>().is_err());
    }
}
