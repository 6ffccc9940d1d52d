//! An async web framework core built around a path trie and a middleware chain.
//!
//! Requests are dispatched by an [`Engine`]: the path is resolved through the route
//! groups' tries, the matched handlers are appended to the global and group middleware,
//! and the resulting chain runs on a pooled [`RequestContext`]. Middleware wraps the rest
//! of the chain by awaiting [`RequestContext::next`], and can stop it with
//! [`RequestContext::abort`].
//!
//! ```no_run
//! use grove_web::{Engine, HandlerResult, RequestContext, RouteGroup, Server, handler_fn};
//! use grove_web::middleware::AccessLog;
//! use http::StatusCode;
//!
//! async fn user(ctx: &mut RequestContext) -> HandlerResult {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     ctx.string(StatusCode::OK, format!("user {id}"));
//!     Ok(())
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let engine = Engine::builder()
//!     .middleware(AccessLog)
//!     .group(RouteGroup::new("/api").get("/user/:id", handler_fn(user)))
//!     .build()?;
//!
//! Server::builder().engine(engine).bind("127.0.0.1:8080").build()?.start().await?;
//! # Ok(())
//! # }
//! ```

mod body;
mod date;
mod engine;
mod error_handler;
mod handler;
mod pool;
mod request;
mod responder;
mod response;
mod server;
mod tls;

pub mod config;
pub mod error;
pub mod middleware;
pub mod router;

pub use body::ResponseBody;
pub use engine::{Engine, EngineBuilder};
pub use error::{BindError, BoxError, DispatchError, RegisterError};
pub use error_handler::{DefaultErrorHandler, ErrorHandler, ErrorPayload};
pub use handler::{FnHandler, Handler, HandlerChain, HandlerFn, HandlerResult, handler_fn};
pub use pool::{ContextPool, PooledContext};
pub use request::{ChainState, PathParams, RequestContext};
pub use responder::{Json, Responder};
pub use response::ResponseWriter;
pub use router::{MethodKey, PathTrie, RouteGroup, TrieNode};
pub use server::{Server, ServerBuildError, ServerBuilder};
pub use tls::TlsError;
