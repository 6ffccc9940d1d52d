use grove_web::middleware::DateHeader;
use grove_web::{Engine, HandlerResult, RequestContext, Server, handler_fn};
use http::StatusCode;

async fn hello_world(ctx: &mut RequestContext) -> HandlerResult {
    ctx.string(StatusCode::OK, "hello world");
    Ok(())
}

#[tokio::main]
async fn main() {
    let engine = Engine::builder().middleware(DateHeader).get("/", handler_fn(hello_world)).build().unwrap();

    Server::builder().engine(engine).bind("127.0.0.1:3000").build().unwrap().start().await.unwrap();
}
