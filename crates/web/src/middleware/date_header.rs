use crate::date::DateService;
use crate::handler::{Handler, HandlerResult};
use crate::request::RequestContext;
use async_trait::async_trait;

/// Stamps an RFC 7231 `Date` header on every response, error responses included.
///
/// The header is set before the downstream chain runs, since the head is frozen once
/// a handler writes. The cached value is refreshed by a task on the tokio runtime that
/// first serves a request through this middleware; when that runtime is gone the date
/// is formatted per request instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateHeader;

#[async_trait]
impl Handler for DateHeader {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        if let Some(date) = DateService::get_global_instance().header_value() {
            ctx.writer_mut().insert_default_header(http::header::DATE, date);
        }
        ctx.next().await
    }
}
