//! Error types raised while registering routes and while dispatching requests.
//!
//! Registration errors are reported once, when the [`Engine`](crate::Engine) is built.
//! Dispatch errors never escape a request: each one is turned into a response by the
//! configured [`ErrorHandler`](crate::ErrorHandler).

use http::{Method, StatusCode};
use std::error::Error;
use thiserror::Error;

/// The error type handlers and middleware report failures with.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("route '{pattern}' is already registered")]
    DuplicateRoute { pattern: String },

    #[error("route '{pattern}' conflicts with wildcard segment '{existing}' at the same level")]
    WildcardConflict { pattern: String, existing: String },

    #[error("catch-all '*' must be the last segment of route '{pattern}'")]
    CatchAllNotLast { pattern: String },

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("handler for {method} '{pattern}' is already registered in group '{group}'")]
    DuplicateHandler { group: String, pattern: String, method: String },
}

impl RegisterError {
    pub fn invalid_pattern<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_owned(), reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{method} {path} not found")]
    RouteNotFound { method: Method, path: String },

    #[error("{method} {path} not allowed")]
    MethodNotAllowed { method: Method, path: String },

    #[error("handler panicked: {message}")]
    HandlerPanic { message: String },

    #[error("handler error: {source}")]
    Handler {
        #[from]
        source: BoxError,
    },
}

impl DispatchError {
    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    /// The status a response carries when this error is rendered without a custom hook.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::HandlerPanic { .. } | Self::Handler { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures of the request binding helpers on [`RequestContext`](crate::RequestContext).
#[derive(Error, Debug)]
pub enum BindError {
    #[error("invalid query string: {source}")]
    Query {
        #[from]
        source: serde_qs::Error,
    },

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}
