// Criterion benchmarks comparing the three matcher backends
//
// Run benchmarks with:
//   cargo bench -p arbor-router

use arbor_http::Method;
use arbor_router::{Backend, Matcher};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn populated(backend: Backend) -> Box<dyn Matcher<usize>> {
    let mut router = backend.build();
    let mut id = 0usize;
    let mut add = |method: Method, path: &str, router: &mut Box<dyn Matcher<usize>>| {
        router.add(method, path, vec![id]).unwrap();
        id += 1;
    };

    for resource in ["users", "orders", "products", "invoices", "teams"] {
        add(Method::Get, &format!("/{}", resource), &mut router);
        add(Method::Post, &format!("/{}", resource), &mut router);
        add(Method::Get, &format!("/{}/:id", resource), &mut router);
        add(Method::Put, &format!("/{}/:id", resource), &mut router);
        add(Method::Delete, &format!("/{}/:id", resource), &mut router);
        add(Method::Get, &format!("/{}/:id/history", resource), &mut router);
        add(Method::Get, &format!("/api/v1/{}/:id/tags", resource), &mut router);
    }
    add(Method::Get, "/assets/*path", &mut router);
    add(Method::Get, "/", &mut router);

    router.push_middlewares("/", vec![1000]).unwrap();
    router.push_middlewares("/api/*", vec![1001]).unwrap();
    router.seal();
    router
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher_lookup");

    let probes = [
        (Method::Get, "/users"),
        (Method::Get, "/orders/12345"),
        (Method::Get, "/api/v1/products/42/tags"),
        (Method::Get, "/assets/css/site/main.css"),
        (Method::Get, "/does/not/exist"),
    ];

    for backend in [Backend::Trie, Backend::Radix, Backend::Regexp] {
        let router = populated(backend);
        group.bench_function(format!("{:?}", backend).to_lowercase(), |b| {
            b.iter(|| {
                for (method, url) in probes {
                    black_box(router.lookup(black_box(method), black_box(url)));
                }
            });
        });
    }

    group.finish();
}

fn bench_static_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher_static_hit");

    for backend in [Backend::Trie, Backend::Radix, Backend::Regexp] {
        let router = populated(backend);
        group.bench_function(format!("{:?}", backend).to_lowercase(), |b| {
            b.iter(|| black_box(router.lookup(Method::Get, black_box("/teams"))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_static_hit);
criterion_main!(benches);
