use crate::error::DispatchError;
use crate::handler::{Handler, HandlerResult};
use crate::request::RequestContext;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Turns a panic anywhere downstream into a logged 500 response.
///
/// This is the only place a panic is converted into a response. Middleware that wants
/// to observe downstream failures should wrap [`RequestContext::next`] the same way.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recovery;

#[async_trait]
impl Handler for Recovery {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;

        let panic = match outcome {
            Ok(result) => return result,
            Err(panic) => panic,
        };

        let message = panic_message(panic.as_ref());
        let backtrace = Backtrace::force_capture();
        error!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = ctx.route().unwrap_or_default(),
            cause = %message,
            %backtrace,
            "handler panicked, recovered"
        );

        ctx.abort();
        ctx.fail(DispatchError::HandlerPanic { message });
        Ok(())
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
