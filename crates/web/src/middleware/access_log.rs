use crate::handler::{Handler, HandlerResult};
use crate::request::RequestContext;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, warn};

/// Logs one line per request once the downstream chain has returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLog;

#[async_trait]
impl Handler for AccessLog {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let start = Instant::now();
        let result = ctx.next().await;
        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        match &result {
            Ok(()) => info!(
                method = %ctx.method(),
                path = %ctx.path(),
                route = ctx.route().unwrap_or("-"),
                status = ctx.response_status().as_u16(),
                elapsed_us,
                "request finished"
            ),
            Err(e) => warn!(
                method = %ctx.method(),
                path = %ctx.path(),
                route = ctx.route().unwrap_or("-"),
                elapsed_us,
                cause = %e,
                "request failed"
            ),
        }

        result
    }
}
