//! The per-request context threaded through the handler chain.
//!
//! This module contains the core types for working with a request in the framework:
//! - `RequestContext`: request access, path parameters, the chain cursor, response
//!   bookkeeping and the error slot
//! - `PathParams`: values captured by `:name` and `*` route segments
//!
//! Contexts are pooled by the [`ContextPool`](crate::ContextPool): a context is reset
//! field by field before it is handed to the next request.

use crate::error::{BindError, BoxError, DispatchError};
use crate::error_handler::{DefaultErrorHandler, ErrorHandler, ErrorPayload};
use crate::handler::{HandlerChain, HandlerResult};
use crate::middleware::panic_message;
use crate::responder::Responder;
use crate::response::{APPLICATION_JSON, ResponseWriter, TEXT_PLAIN_UTF_8};
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri, Version};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{Span, error, warn};

/// Cursor value marking an aborted chain; no chain is ever this long.
const ABORT_INDEX: usize = usize::MAX >> 1;

/// Where a request's handler chain currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// no handler has been started yet
    Pending,
    /// handlers are executing
    Running,
    /// the chain was cut short by [`RequestContext::abort`]
    Aborted,
    /// every handler ran
    Completed,
}

pub struct RequestContext {
    request: Request<Bytes>,
    params: PathParams,
    route: Option<String>,
    chain: HandlerChain,
    index: usize,
    running: bool,
    handler_matched: bool,
    writer: ResponseWriter,
    errors: Vec<DispatchError>,
    values: HashMap<String, String>,
    extensions: Extensions,
    span: Span,
    error_handler: Arc<dyn ErrorHandler>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("params", &self.params)
            .field("route", &self.route)
            .field("chain_len", &self.chain.len())
            .field("index", &self.index)
            .field("writer", &self.writer)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub(crate) fn new(error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            request: Request::default(),
            params: PathParams::empty(),
            route: None,
            chain: Vec::new(),
            index: 0,
            running: false,
            handler_matched: false,
            writer: ResponseWriter::new(),
            errors: Vec::new(),
            values: HashMap::new(),
            extensions: Extensions::new(),
            span: Span::none(),
            error_handler,
        }
    }

    /// Loads a request into a freshly acquired context. The chain is filled separately.
    pub(crate) fn prepare(&mut self, request: Request<Bytes>, route: Option<String>, handler_matched: bool, span: Span) {
        self.request = request;
        self.route = route;
        self.handler_matched = handler_matched;
        self.span = span;
    }

    pub(crate) fn chain_mut(&mut self) -> &mut HandlerChain {
        &mut self.chain
    }

    pub(crate) fn params_mut(&mut self) -> &mut PathParams {
        &mut self.params
    }

    /// Clears every per-request field. After this the context cannot be told apart
    /// from a newly allocated one.
    pub(crate) fn reset(&mut self) {
        self.request = Request::default();
        self.params.clear();
        self.route = None;
        self.chain.clear();
        self.index = 0;
        self.running = false;
        self.handler_matched = false;
        self.writer.reset();
        self.errors.clear();
        self.values.clear();
        self.extensions.clear();
        self.span = Span::none();
    }

    // ---- request access ----

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn version(&self) -> Version {
        self.request.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// The registered pattern that matched, e.g. `/user/:id`; `None` for 404s.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// A path parameter by name; `None` when the route has no such capture.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// `false` when the chain ends in the not-found/not-allowed fallback instead of a route handler.
    pub fn handler_matched(&self) -> bool {
        self.handler_matched
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Stores a string value for handlers further down the chain.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Typed per-request storage, for values that are not strings.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let query = self.uri().query().unwrap_or_default();
        Ok(serde_qs::from_str::<T>(query)?)
    }

    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        Ok(serde_json::from_slice::<T>(self.body())?)
    }

    pub fn bind_form<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        Ok(serde_urlencoded::from_bytes::<T>(self.body())?)
    }

    // ---- chain control ----

    /// Runs the remaining handlers of the chain in order.
    ///
    /// A middleware calls this to wrap the downstream handlers: code placed after the
    /// `.await` runs once everything downstream has returned. The loop keeps going when a
    /// handler returns without calling `next`, so a pre-only middleware needs no call at all.
    /// A handler returning `Err` aborts the chain and the error is handed back to the caller.
    pub async fn next(&mut self) -> HandlerResult {
        while self.index < self.chain.len() {
            let handler = Arc::clone(&self.chain[self.index]);
            self.index += 1;
            if let Err(e) = handler.call(self).await {
                self.abort();
                return Err(e);
            }
        }
        Ok(())
    }

    pub(crate) async fn run(&mut self) -> HandlerResult {
        self.running = true;
        let result = self.next().await;
        self.running = false;
        result
    }

    /// Stops the chain: handlers that have not started yet never run.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Writes the status and a plain-text body, then aborts the chain.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.string(status, status.to_string());
        self.abort();
    }

    /// Number of handlers started so far; once the chain is aborted this is a sentinel
    /// past any chain length, see [`RequestContext::is_aborted`].
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ChainState {
        if self.is_aborted() {
            ChainState::Aborted
        } else if self.running {
            ChainState::Running
        } else if self.index == 0 {
            ChainState::Pending
        } else {
            ChainState::Completed
        }
    }

    // ---- response ----

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn status(&mut self, status: StatusCode) {
        self.writer.set_status(status);
    }

    pub fn response_status(&self) -> StatusCode {
        self.writer.committed_status().unwrap_or_else(|| self.writer.status())
    }

    pub fn header(&mut self, name: HeaderName, value: HeaderValue) {
        self.writer.insert_header(name, value);
    }

    pub fn is_written(&self) -> bool {
        self.writer.is_written()
    }

    pub fn write(&mut self, data: &[u8]) {
        self.writer.write(data);
    }

    pub fn string(&mut self, status: StatusCode, body: impl AsRef<str>) {
        self.writer.insert_header_if_absent(http::header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
        self.writer.write_header(status);
        self.writer.write(body.as_ref().as_bytes());
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> HandlerResult {
        let bytes = serde_json::to_vec(value)?;
        self.writer.insert_header_if_absent(http::header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        self.writer.write_header(status);
        self.writer.write(&bytes);
        Ok(())
    }

    pub fn respond<R: Responder>(&mut self, responder: R) -> HandlerResult {
        responder.respond_to(&mut self.writer)
    }

    // ---- errors ----

    /// Records a failure without stopping the chain; the error hook renders the last
    /// recorded error if nothing has been written once the chain finishes.
    pub fn push_error<E: Into<BoxError>>(&mut self, error: E) {
        self.errors.push(DispatchError::handler(error));
    }

    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&DispatchError> {
        self.errors.last()
    }

    /// Renders `error` through the error hook (unless a response is already on its way)
    /// and records it.
    pub(crate) fn fail(&mut self, error: DispatchError) {
        self.render_error(&error);
        self.errors.push(error);
    }

    /// Renders the most recent recorded error when the chain left the response unwritten.
    pub(crate) fn flush_errors(&mut self) {
        if self.writer.is_written() {
            return;
        }
        if let Some(error) = self.errors.last() {
            let (status, payload) = handle_error(self.error_handler.as_ref(), error);
            write_payload(&mut self.writer, status, payload);
        }
    }

    fn render_error(&mut self, error: &DispatchError) {
        if self.writer.is_written() {
            warn!(cause = %error, status = %self.response_status(), "response already sent, error not rendered");
            return;
        }
        let (status, payload) = handle_error(self.error_handler.as_ref(), error);
        write_payload(&mut self.writer, status, payload);
    }

    pub(crate) fn take_response(&mut self) -> http::Response<crate::ResponseBody> {
        self.writer.take_response()
    }
}

/// Runs the error hook; a panicking hook falls back to the default rendering.
fn handle_error(error_handler: &dyn ErrorHandler, error: &DispatchError) -> (StatusCode, ErrorPayload) {
    match panic::catch_unwind(AssertUnwindSafe(|| error_handler.handle(error))) {
        Ok(rendered) => rendered,
        Err(panic) => {
            error!(cause = %error, panic = %panic_message(panic.as_ref()), "error handler panicked, default rendering used");
            DefaultErrorHandler.handle(error)
        }
    }
}

/// Replaces whatever the failed handler queued with the rendered error.
fn write_payload(writer: &mut ResponseWriter, status: StatusCode, payload: ErrorPayload) {
    writer.clear_pending_headers();
    let (content_type, bytes) = match payload {
        ErrorPayload::Text(text) => (TEXT_PLAIN_UTF_8, Bytes::from(text)),
        ErrorPayload::Json(value) => (APPLICATION_JSON, Bytes::from(value.to_string())),
    };
    writer.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    writer.write_header(status);
    writer.write(&bytes);
}

/// Values captured from the request path by `:name` and `*` segments.
///
/// The catch-all segment is stored under the key `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { inner: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.inner.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn push(&mut self, name: &str, value: impl Into<String>) {
        self.inner.push((name.to_owned(), value.into()));
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }
}
