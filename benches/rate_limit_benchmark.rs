use criterion::{criterion_group, criterion_main, Criterion};
use dspm_auth::middleware::RateLimiter;
use std::hint::black_box;
use std::time::Duration;

fn benchmark_rate_limit_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit_check");

    // One hot source address
    let limiter = RateLimiter::new(Duration::from_secs(900), u32::MAX);
    group.bench_function("single_source", |b| {
        b.iter(|| limiter.check(black_box("203.0.113.7")))
    });

    // Many distinct sources spread across the map shards
    let limiter = RateLimiter::new(Duration::from_secs(900), u32::MAX);
    let sources: Vec<String> = (0..10_000)
        .map(|i| format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256))
        .collect();
    let mut next = 0usize;
    group.bench_function("many_sources", |b| {
        b.iter(|| {
            next = (next + 1) % sources.len();
            limiter.check(black_box(&sources[next]))
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_rate_limit_check);
criterion_main!(benches);
