use async_trait::async_trait;
use grove_web::config::ServerConfig;
use grove_web::middleware::{AccessLog, DateHeader};
use grove_web::{
    DispatchError, Engine, ErrorPayload, Handler, HandlerResult, Json, RequestContext, RouteGroup, Server, handler_fn,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

#[derive(Deserialize, Debug)]
pub struct Page {
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Rejects requests without an `x-api-key` header.
struct ApiKey;

#[async_trait]
impl Handler for ApiKey {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        if ctx.headers().get("x-api-key").is_none() {
            ctx.abort_with_status(StatusCode::UNAUTHORIZED);
        }
        Ok(())
    }
}

// curl -v http://127.0.0.1:8080/
async fn index(ctx: &mut RequestContext) -> HandlerResult {
    let body = format!("receive from method: {}\r\n", ctx.method());
    ctx.string(StatusCode::OK, body);
    Ok(())
}

// curl -v -H 'x-api-key: 1' 'http://127.0.0.1:8080/api/v1/users?offset=10'
async fn list_users(ctx: &mut RequestContext) -> HandlerResult {
    let page: Page = ctx.query()?;
    ctx.json(StatusCode::OK, &json!({ "offset": page.offset, "limit": page.limit, "users": [] }))
}

// curl -v -H 'x-api-key: 1' http://127.0.0.1:8080/api/v1/users/42
async fn get_user(ctx: &mut RequestContext) -> HandlerResult {
    let id = ctx.param("id").unwrap_or_default().to_owned();
    ctx.respond(Json(User { name: format!("user-{id}"), zip: "00000".into() }))
}

// curl -v -H 'x-api-key: 1' -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:8080/api/v1/users
async fn create_user(ctx: &mut RequestContext) -> HandlerResult {
    let user: User = ctx.bind_json()?;
    info!(?user, "create user");
    ctx.respond((StatusCode::CREATED, Json(user)))
}

// curl -v http://127.0.0.1:8080/static/css/site.css
async fn static_file(ctx: &mut RequestContext) -> HandlerResult {
    let file = ctx.param("*").unwrap_or_default().to_owned();
    ctx.string(StatusCode::OK, format!("would serve {file}\r\n"));
    Ok(())
}

fn render_error(error: &DispatchError) -> (StatusCode, ErrorPayload) {
    let status = error.status_code();
    let message = match error {
        DispatchError::Handler { source } => source.to_string(),
        _ => status.canonical_reason().unwrap_or_default().to_owned(),
    };
    (status, json!({ "code": status.as_u16(), "message": message }).into())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // an optional JSON config file, e.g. {"address": "127.0.0.1:8080", "max_body_size": 1048576}
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json_file(path).unwrap(),
        None => ServerConfig::default(),
    };

    let api = RouteGroup::new("/api").with(ApiKey).group("/v1", |v1| {
        v1.get("/users", handler_fn(list_users)).post("/users", handler_fn(create_user)).get("/users/:id", handler_fn(get_user))
    });

    let engine = Engine::builder()
        .config(config.engine.clone())
        .middleware(AccessLog)
        .middleware(DateHeader)
        .error_handler(render_error)
        .group(api)
        .get("/", handler_fn(index))
        .get("/static/*", handler_fn(static_file))
        .build()
        .unwrap();

    let address = config.address.clone().unwrap_or_else(|| "127.0.0.1:8080".to_owned());
    Server::builder()
        .engine(engine)
        .config(config)
        .bind(address)
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();
}
