//! Route groups: a URL prefix, a path trie and the handlers registered per route and method.
//!
//! Group middleware is kept apart from the route handlers and only joined with them
//! when a request is dispatched, so sub-groups can inherit it without copying handler
//! lists at registration time.

use crate::error::RegisterError;
use crate::handler::{Handler, HandlerChain};
use crate::request::PathParams;
use crate::router::trie::{PathTrie, normalize};
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

/// The method half of a route registration.
///
/// `Any` matches every verb and wins over an `Exact` registration of the same route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKey {
    Any,
    Exact(Method),
}

impl From<Method> for MethodKey {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Exact(method) => fmt::Display::fmt(method, f),
        }
    }
}

/// Outcome of resolving a path inside one group.
pub(crate) enum Resolution<'g> {
    NotFound,
    MethodNotAllowed { route: &'g str },
    Found { route: &'g str, method: &'g MethodKey, handlers: &'g [Arc<dyn Handler>] },
}

pub struct RouteGroup {
    prefix: String,
    trie: PathTrie,
    handlers: HashMap<String, HashMap<MethodKey, HandlerChain>>,
    middleware: HandlerChain,
    children: Vec<RouteGroup>,
    errors: Vec<RegisterError>,
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("prefix", &self.prefix)
            .field("routes", &self.handlers.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Registers `handler` for ", stringify!($method), " requests to `pattern`.")]
        pub fn $name<H: Handler + 'static>(self, pattern: &str, handler: H) -> Self {
            self.route(Method::$method, pattern, handler)
        }
    };
}

impl RouteGroup {
    /// Creates a group serving every path below `prefix`; `""` and `"/"` mean the whole site.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: normalize_prefix(prefix.as_ref()),
            trie: PathTrie::new(),
            handlers: HashMap::new(),
            middleware: Vec::new(),
            children: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends a middleware that runs for every route of this group and its sub-groups.
    pub fn with<H: Handler + 'static>(mut self, middleware: H) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers a handler list for `method` on `pattern`.
    ///
    /// Registration problems are collected and reported when the engine is built.
    pub fn handle<I>(mut self, method: impl Into<MethodKey>, pattern: &str, handlers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Handler>>,
    {
        let method = method.into();
        let route = normalize(pattern).to_owned();

        if !self.handlers.contains_key(&route) {
            if let Err(e) = self.trie.insert(pattern, route.clone()) {
                self.errors.push(e);
                return self;
            }
        }

        let methods = self.handlers.entry(route).or_default();
        if methods.contains_key(&method) {
            self.errors.push(RegisterError::DuplicateHandler {
                group: self.prefix.clone(),
                pattern: pattern.to_owned(),
                method: method.to_string(),
            });
            return self;
        }
        methods.insert(method, handlers.into_iter().collect());
        self
    }

    pub fn route<H: Handler + 'static>(self, method: impl Into<MethodKey>, pattern: &str, handler: H) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        self.handle(method, pattern, [handler])
    }

    /// Registers `handler` for every method on `pattern`.
    pub fn any<H: Handler + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(MethodKey::Any, pattern, handler)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(delete, DELETE);
    method_route!(patch, PATCH);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);

    /// Adds a sub-group below this group's prefix, inheriting this group's middleware.
    pub fn group<F>(mut self, prefix: impl AsRef<str>, configure: F) -> Self
    where
        F: FnOnce(RouteGroup) -> RouteGroup,
    {
        self.children.push(configure(RouteGroup::new(prefix)));
        self
    }

    pub(crate) fn middleware(&self) -> &[Arc<dyn Handler>] {
        &self.middleware
    }

    /// The part of `path` this group routes on, if `path` lies below the prefix.
    pub(crate) fn strip_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(self.prefix.as_str())? {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }

    pub(crate) fn resolve<'g>(&'g self, path: &str, method: &Method, params: &mut PathParams) -> Resolution<'g> {
        let Some(node) = self.trie.lookup(path, params) else {
            return Resolution::NotFound;
        };
        let route = node.route_name();
        let Some(methods) = self.handlers.get(route) else {
            return Resolution::NotFound;
        };

        let matched = methods
            .get_key_value(&MethodKey::Any)
            .or_else(|| methods.get_key_value(&MethodKey::Exact(method.clone())));

        match matched {
            Some((method, handlers)) => Resolution::Found { route, method, handlers },
            None => Resolution::MethodNotAllowed { route },
        }
    }

    /// The full pattern of `route` including this group's prefix.
    pub(crate) fn full_route(&self, route: &str) -> String {
        match route {
            "/" if !self.prefix.is_empty() => self.prefix.clone(),
            _ => format!("{}{}", self.prefix, route),
        }
    }

    /// Moves this group and all of its sub-groups into `groups`, parents first, with
    /// prefixes and middleware lists fully expanded.
    pub(crate) fn flatten(
        mut self,
        parent_prefix: &str,
        parent_middleware: &[Arc<dyn Handler>],
        groups: &mut Vec<RouteGroup>,
        errors: &mut Vec<RegisterError>,
    ) {
        self.prefix = format!("{parent_prefix}{}", self.prefix);

        let mut middleware = parent_middleware.to_vec();
        middleware.append(&mut self.middleware);
        self.middleware = middleware;

        errors.append(&mut self.errors);

        let children = mem::take(&mut self.children);
        let prefix = self.prefix.clone();
        let middleware = self.middleware.clone();
        groups.push(self);

        for child in children {
            child.flatten(&prefix, &middleware, groups, errors);
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerResult;
    use crate::request::RequestContext;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn call(&self, _ctx: &mut RequestContext) -> HandlerResult {
            Ok(())
        }
    }

    fn resolve<'g>(group: &'g RouteGroup, method: Method, path: &str) -> Resolution<'g> {
        let path = group.strip_prefix(path).unwrap();
        group.resolve(path, &method, &mut PathParams::empty())
    }

    #[test]
    fn any_takes_precedence_over_exact_method() {
        let group = RouteGroup::new("").get("/ping", Noop).any("/ping", Noop);

        match resolve(&group, Method::GET, "/ping") {
            Resolution::Found { route, method, .. } => {
                assert_eq!(route, "/ping");
                assert_eq!(method, &MethodKey::Any);
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn exact_method_is_used_without_any() {
        let group = RouteGroup::new("").get("/ping", Noop).post("/ping", Noop);

        match resolve(&group, Method::POST, "/ping") {
            Resolution::Found { method, handlers, .. } => {
                assert_eq!(method, &MethodKey::Exact(Method::POST));
                assert_eq!(handlers.len(), 1);
            }
            _ => panic!("expected a match"),
        }
        assert!(matches!(resolve(&group, Method::DELETE, "/ping"), Resolution::MethodNotAllowed { route: "/ping" }));
        assert!(matches!(resolve(&group, Method::GET, "/pong"), Resolution::NotFound));
    }

    #[test]
    fn duplicate_method_is_reported() {
        let group = RouteGroup::new("/api").get("/ping", Noop).get("/ping/", Noop);

        assert_eq!(
            group.errors,
            vec![RegisterError::DuplicateHandler { group: "/api".into(), pattern: "/ping/".into(), method: "GET".into() }]
        );
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let group = RouteGroup::new("").get("ping", Noop);

        assert_eq!(group.errors.len(), 1);
        assert!(group.handlers.is_empty());
    }

    #[test]
    fn prefix_is_stripped_on_segment_boundary() {
        let group = RouteGroup::new("/api/");

        assert_eq!(group.prefix(), "/api");
        assert_eq!(group.strip_prefix("/api/users"), Some("/users"));
        assert_eq!(group.strip_prefix("/api"), Some("/"));
        assert_eq!(group.strip_prefix("/apiary"), None);
        assert_eq!(group.strip_prefix("/other"), None);
        assert_eq!(RouteGroup::new("/").strip_prefix("/other"), Some("/other"));
    }

    #[test]
    fn full_route_includes_prefix() {
        let group = RouteGroup::new("/api");

        assert_eq!(group.full_route("/user/:id"), "/api/user/:id");
        assert_eq!(group.full_route("/"), "/api");
        assert_eq!(RouteGroup::new("").full_route("/"), "/");
    }

    #[test]
    fn flatten_inherits_prefix_and_middleware() {
        let group = RouteGroup::new("/api")
            .with(Noop)
            .get("/health", Noop)
            .group("/v1", |v1| v1.with(Noop).with(Noop).get("/users", Noop).group("admin", |admin| admin.get("/", Noop)));

        let mut groups = Vec::new();
        let mut errors = Vec::new();
        group.flatten("", &[], &mut groups, &mut errors);

        let prefixes = groups.iter().map(RouteGroup::prefix).collect::<Vec<_>>();
        assert_eq!(prefixes, vec!["/api", "/api/v1", "/api/v1/admin"]);

        let middleware = groups.iter().map(|group| group.middleware().len()).collect::<Vec<_>>();
        assert_eq!(middleware, vec![1, 3, 3]);
        assert!(errors.is_empty());
    }
}
