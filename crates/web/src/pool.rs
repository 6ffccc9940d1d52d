//! A pool of reusable request contexts.
//!
//! Every request borrows a [`RequestContext`] from the pool and gives it back when the
//! [`PooledContext`] guard is dropped, which also happens while unwinding. Contexts are
//! reset on release, so the next request never observes state left behind by the
//! previous one.

use crate::error_handler::ErrorHandler;
use crate::request::RequestContext;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct ContextPool {
    idle: Mutex<Vec<RequestContext>>,
    max_idle: usize,
    allocated: AtomicUsize,
    error_handler: Arc<dyn ErrorHandler>,
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool").field("idle", &self.idle_len()).field("max_idle", &self.max_idle).field("allocated", &self.allocated()).finish()
    }
}

impl ContextPool {
    /// Creates a pool keeping at most `max_idle` contexts around between requests.
    pub fn new(max_idle: usize, error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self { idle: Mutex::new(Vec::with_capacity(max_idle.min(64))), max_idle, allocated: AtomicUsize::new(0), error_handler }
    }

    /// Takes an idle context or allocates a new one.
    pub fn acquire(&self) -> PooledContext<'_> {
        let reused = self.lock_idle().pop();
        let ctx = reused.unwrap_or_else(|| self.allocate());
        PooledContext { pool: self, ctx: Some(ctx) }
    }

    /// Clears all per-request state of `ctx` and keeps it for a later [`ContextPool::acquire`].
    pub fn release(&self, mut ctx: RequestContext) {
        ctx.reset();
        let mut idle = self.lock_idle();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }

    pub fn idle_len(&self) -> usize {
        self.lock_idle().len()
    }

    /// Number of contexts this pool has ever allocated.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    fn allocate(&self) -> RequestContext {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        RequestContext::new(Arc::clone(&self.error_handler))
    }

    // the lock is never held across user code, a poisoned list is still consistent
    fn lock_idle(&self) -> MutexGuard<'_, Vec<RequestContext>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A context on loan from a [`ContextPool`]; returned to the pool on drop.
pub struct PooledContext<'pool> {
    pool: &'pool ContextPool,
    // only `None` while the guard is being dropped
    ctx: Option<RequestContext>,
}

impl fmt::Debug for PooledContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledContext").field(&**self).finish()
    }
}

impl Deref for PooledContext<'_> {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target {
        self.ctx.as_ref().expect("pooled context is present until drop")
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx.as_mut().expect("pooled context is present until drop")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
