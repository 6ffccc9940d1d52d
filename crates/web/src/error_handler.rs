//! The process-wide hook that turns a [`DispatchError`] into a status and a payload.
//!
//! The hook is consulted for every failure the dispatcher resolves: unmatched routes,
//! unmatched methods, recovered panics and errors reported by handlers. Whatever it
//! returns is written to the client, so it must never leak internals it does not want
//! to expose; log details belong in the tracing output instead.

use crate::error::DispatchError;
use http::StatusCode;

/// The body half of an error response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorPayload {
    /// rendered as `text/plain; charset=utf-8`
    Text(String),
    /// rendered as `application/json`
    Json(serde_json::Value),
}

impl From<String> for ErrorPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ErrorPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<serde_json::Value> for ErrorPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Maps an error to the response the client receives.
///
/// Any `Fn(&DispatchError) -> (StatusCode, ErrorPayload)` closure is an `ErrorHandler`.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &DispatchError) -> (StatusCode, ErrorPayload);
}

impl<F> ErrorHandler for F
where
    F: Fn(&DispatchError) -> (StatusCode, ErrorPayload) + Send + Sync,
{
    fn handle(&self, error: &DispatchError) -> (StatusCode, ErrorPayload) {
        (self)(error)
    }
}

/// Used when no hook is registered: the canonical status line as plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: &DispatchError) -> (StatusCode, ErrorPayload) {
        let status = error.status_code();
        (status, ErrorPayload::Text(status.to_string()))
    }
}
