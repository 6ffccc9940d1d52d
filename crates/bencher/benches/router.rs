use bencher::{test_cases, TestGroup, API_ROUTES};
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use grove_web::{handler_fn, Engine, HandlerResult, PathParams, PathTrie, RequestContext};
use http::{Request, StatusCode};
use std::hint::black_box;

async fn ok(ctx: &mut RequestContext) -> HandlerResult {
    ctx.string(StatusCode::OK, "ok");
    Ok(())
}

fn benchmark_trie_lookup(criterion: &mut Criterion) {
    let mut trie = PathTrie::new();
    for route in API_ROUTES {
        trie.insert(route, *route).expect("benchmark routes should not conflict");
    }

    let mut group = criterion.benchmark_group("trie_lookup");
    for case in test_cases() {
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let mut params = PathParams::empty();
                let found = trie.lookup(black_box(case.path()), &mut params);
                assert_eq!(found.is_some(), case.group() == TestGroup::Hit);
                black_box((found, params));
            });
        });
    }
    group.finish();
}

fn benchmark_engine_serve(criterion: &mut Criterion) {
    let engine = API_ROUTES
        .iter()
        .fold(Engine::builder(), |builder, route| builder.get(route, handler_fn(ok)))
        .build()
        .expect("benchmark routes should not conflict");
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should start");

    let mut group = criterion.benchmark_group("engine_serve");
    for case in test_cases() {
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let request = Request::get(case.path()).body(Bytes::new()).expect("benchmark paths should be valid uris");
                black_box(runtime.block_on(engine.serve(request)));
            });
        });
    }
    group.finish();
}

criterion_group!(router, benchmark_trie_lookup, benchmark_engine_serve);
criterion_main!(router);
