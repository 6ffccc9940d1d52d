//! The dispatcher: from a request to a response.
//!
//! An [`Engine`] is assembled once by an [`EngineBuilder`] and is read-only afterwards,
//! so any number of requests can be dispatched through a shared reference.
//!
//! For each request the engine:
//! 1. tries the route groups in registration order, skipping groups whose prefix does
//!    not cover the path and groups whose trie has no terminal match;
//! 2. builds the chain `global middleware + group middleware + route handlers`, or, when
//!    nothing matched, `global middleware (+ group middleware) + fallback` where the
//!    fallback reports 404/405 through the error hook;
//! 3. runs the chain on a pooled [`RequestContext`] and renders any error left behind;
//! 4. returns the context to the pool.
//!
//! [`Recovery`] is always the first global middleware, so a panicking handler becomes a
//! 500 response instead of taking the connection down.

use crate::body::ResponseBody;
use crate::config::EngineConfig;
use crate::error::{DispatchError, RegisterError};
use crate::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::handler::{Handler, HandlerChain, HandlerResult};
use crate::middleware::Recovery;
use crate::pool::ContextPool;
use crate::request::RequestContext;
use crate::router::{MethodKey, Resolution, RouteGroup};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Response};
use std::fmt;
use std::iter;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span};

pub struct Engine {
    groups: Vec<RouteGroup>,
    middleware: HandlerChain,
    pool: ContextPool,
    not_found: Arc<dyn Handler>,
    method_not_allowed: Arc<dyn Handler>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("groups", &self.groups)
            .field("middleware", &self.middleware.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Dispatches one request. Every failure is resolved into the returned response.
    pub async fn serve(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        let mut ctx = self.pool.acquire();
        self.dispatch(&mut ctx, request).await;
        ctx.take_response()
    }

    async fn dispatch(&self, ctx: &mut RequestContext, request: Request<Bytes>) {
        let span = info_span!("request", method = %request.method(), path = %request.uri().path());
        let (route, handler_matched) = span.in_scope(|| self.assemble_chain(ctx, request.method(), request.uri().path()));
        ctx.prepare(request, route, handler_matched, span.clone());

        match ctx.run().instrument(span).await {
            Ok(()) => ctx.flush_errors(),
            Err(e) => ctx.fail(DispatchError::Handler { source: e }),
        }
    }

    /// Fills the context's chain and path parameters; returns the matched route and
    /// whether a route handler (rather than a fallback) ends the chain.
    fn assemble_chain(&self, ctx: &mut RequestContext, method: &Method, path: &str) -> (Option<String>, bool) {
        ctx.chain_mut().extend(self.middleware.iter().cloned());

        for group in &self.groups {
            let Some(rest) = group.strip_prefix(path) else {
                continue;
            };

            match group.resolve(rest, method, ctx.params_mut()) {
                Resolution::NotFound => continue,
                Resolution::MethodNotAllowed { route } => {
                    let route = group.full_route(route);
                    debug!(route = %route, "route matched, no handler for method");
                    ctx.chain_mut().extend(group.middleware().iter().cloned());
                    ctx.chain_mut().push(Arc::clone(&self.method_not_allowed));
                    return (Some(route), false);
                }
                Resolution::Found { route, method, handlers } => {
                    let route = group.full_route(route);
                    debug!(route = %route, registered = %method, "route matched");
                    ctx.chain_mut().extend(group.middleware().iter().cloned());
                    ctx.chain_mut().extend(handlers.iter().cloned());
                    return (Some(route), true);
                }
            }
        }

        debug!("no route matched");
        ctx.chain_mut().push(Arc::clone(&self.not_found));
        (None, false)
    }
}

/// Ends the chain of a request no route matched.
struct NotFoundFallback;

#[async_trait]
impl Handler for NotFoundFallback {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let error = DispatchError::RouteNotFound { method: ctx.method().clone(), path: ctx.path().to_owned() };
        ctx.fail(error);
        Ok(())
    }
}

/// Ends the chain of a request whose route matched but whose method did not.
struct MethodNotAllowedFallback;

#[async_trait]
impl Handler for MethodNotAllowedFallback {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let error = DispatchError::MethodNotAllowed { method: ctx.method().clone(), path: ctx.path().to_owned() };
        ctx.fail(error);
        Ok(())
    }
}

/// Collects routes, groups, middleware and the error hook; [`EngineBuilder::build`]
/// freezes them into an [`Engine`].
pub struct EngineBuilder {
    root: RouteGroup,
    groups: Vec<RouteGroup>,
    middleware: HandlerChain,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    config: EngineConfig,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("root", &self.root)
            .field("groups", &self.groups)
            .field("middleware", &self.middleware.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident) => {
        #[doc = concat!("Registers `handler` on the root group, see [`RouteGroup::", stringify!($name), "`].")]
        pub fn $name<H: Handler + 'static>(mut self, pattern: &str, handler: H) -> Self {
            self.root = self.root.$name(pattern, handler);
            self
        }
    };
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            root: RouteGroup::new(""),
            groups: Vec::new(),
            middleware: vec![Arc::new(Recovery)],
            error_handler: None,
            config: EngineConfig::default(),
        }
    }

    /// Appends a global middleware; it runs after [`Recovery`] and earlier global middleware.
    pub fn middleware<H: Handler + 'static>(mut self, middleware: H) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers a route group. Groups are tried in the order they are registered; routes
    /// added directly on the builder are tried last.
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn route<H: Handler + 'static>(mut self, method: impl Into<MethodKey>, pattern: &str, handler: H) -> Self {
        self.root = self.root.route(method, pattern, handler);
        self
    }

    pub fn handle<I>(mut self, method: impl Into<MethodKey>, pattern: &str, handlers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Handler>>,
    {
        self.root = self.root.handle(method, pattern, handlers);
        self
    }

    method_route!(any);
    method_route!(get);
    method_route!(post);
    method_route!(put);
    method_route!(delete);
    method_route!(patch);
    method_route!(head);
    method_route!(options);

    pub fn error_handler<E: ErrorHandler + 'static>(mut self, error_handler: E) -> Self {
        self.error_handler = Some(Arc::new(error_handler));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Freezes the registration. Fails with the first registration error found.
    pub fn build(self) -> Result<Engine, RegisterError> {
        let mut groups = Vec::new();
        let mut errors = Vec::new();
        for group in self.groups.into_iter().chain(iter::once(self.root)) {
            group.flatten("", &[], &mut groups, &mut errors);
        }

        for e in &errors {
            error!(cause = %e, "route registration failed");
        }
        if let Some(e) = errors.into_iter().next() {
            return Err(e);
        }

        let error_handler = self.error_handler.unwrap_or_else(|| Arc::new(DefaultErrorHandler));

        Ok(Engine {
            groups,
            middleware: self.middleware,
            pool: ContextPool::new(self.config.max_idle_contexts, error_handler),
            not_found: Arc::new(NotFoundFallback),
            method_not_allowed: Arc::new(MethodNotAllowedFallback),
        })
    }
}
