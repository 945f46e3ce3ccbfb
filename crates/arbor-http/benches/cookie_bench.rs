// Criterion benchmarks for the arbor-http cookie codec
//
// Run benchmarks with:
//   cargo bench -p arbor-http

use arbor_http::cookie::{self, CookieOptions, Priority, SameSite};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("cookie_serialize");

    group.bench_function("bare_pair", |b| {
        let options = CookieOptions::default();
        b.iter(|| cookie::serialize(black_box("session"), black_box("abc123"), &options));
    });

    group.bench_function("full_attributes", |b| {
        let options = CookieOptions {
            max_age: Some(3600),
            domain: Some("example.com".into()),
            http_only: true,
            path: Some("/".into()),
            same_site: Some(SameSite::Lax),
            priority: Some(Priority::High),
            secure: true,
            ..Default::default()
        };
        b.iter(|| cookie::serialize(black_box("session"), black_box("abc123"), &options));
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cookie_parse");

    let small = "a=1; b=2";
    let large = (0..32)
        .map(|i| format!("key{}=value{}", i, i))
        .collect::<Vec<_>>()
        .join("; ");

    group.bench_function("two_pairs", |b| {
        b.iter(|| cookie::parse(black_box(small)));
    });

    group.bench_function("thirty_two_pairs", |b| {
        b.iter(|| cookie::parse(black_box(&large)));
    });

    group.finish();
}

criterion_group!(benches, bench_serialize, bench_parse);
criterion_main!(benches);
