use crate::error::BoxError;
use crate::request::RequestContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

pub type HandlerResult = Result<(), BoxError>;

/// A middleware or a final request handler.
///
/// Both kinds share one signature: a middleware is simply a handler that calls
/// [`RequestContext::next`] to run the rest of the chain, and may run code before and
/// after that call.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult;
}

/// An ordered list of handlers: global middleware, group middleware, then route handlers.
pub type HandlerChain = Vec<Arc<dyn Handler>>;

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        self.as_ref().call(ctx).await
    }
}

/// An async fn taking the request context, for the lifetime of one borrow.
///
/// This is implemented for every `async fn(&mut RequestContext) -> HandlerResult`.
pub trait HandlerFn<'ctx>: Send + Sync {
    type Fut: Future<Output = HandlerResult> + Send + 'ctx;

    fn invoke(&self, ctx: &'ctx mut RequestContext) -> Self::Fut;
}

impl<'ctx, F, Fut> HandlerFn<'ctx> for F
where
    F: Fn(&'ctx mut RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'ctx,
{
    type Fut = Fut;

    #[inline]
    fn invoke(&self, ctx: &'ctx mut RequestContext) -> Self::Fut {
        (self)(ctx)
    }
}

/// a [`HandlerFn`] holder which represents any async fn handler
#[derive(Debug, Clone, Copy)]
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'ctx> HandlerFn<'ctx>,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'ctx> HandlerFn<'ctx> + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        self.f.invoke(ctx).await
    }
}

#[cfg(test)]
mod test {
    use crate::handler::{handler_fn, FnHandler, Handler, HandlerFn, HandlerResult};
    use crate::request::RequestContext;

    fn assert_is_handler_fn<F: for<'ctx> HandlerFn<'ctx>>(_f: &FnHandler<F>) {
        // no op
    }

    fn assert_is_handler<T: Handler>(_handler: &T) {
        // no op
    }

    #[test]
    fn assert_fn_is_handler_1() {
        async fn get(_ctx: &mut RequestContext) -> HandlerResult {
            Ok(())
        }

        let handler = handler_fn(get);
        assert_is_handler_fn(&handler);
        assert_is_handler(&handler);
    }

    #[test]
    fn assert_fn_is_handler_2() {
        async fn middleware(ctx: &mut RequestContext) -> HandlerResult {
            ctx.next().await?;
            ctx.abort();
            Ok(())
        }

        let handler = handler_fn(middleware);
        assert_is_handler_fn(&handler);
        assert_is_handler(&handler);
    }
}
