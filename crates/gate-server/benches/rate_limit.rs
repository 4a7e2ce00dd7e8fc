//! Benchmarks for the channel rate limiter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gate_core::SystemClock;
use gate_server::{ChannelRateLimiter, RateLimits};

fn bench_check_and_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_and_record");

    for channels in [1i64, 64, 4096] {
        let limiter = ChannelRateLimiter::new(SystemClock::shared());
        let limits = RateLimits::new(u32::MAX, u32::MAX);

        group.bench_with_input(
            BenchmarkId::from_parameter(channels),
            &limiter,
            |b, limiter| {
                let mut counter = 0i64;
                b.iter(|| {
                    counter = (counter + 1) % channels;
                    let result = limiter.check_and_record(black_box(counter), 0, limits);
                    black_box(result)
                })
            },
        );
    }

    group.finish();
}

fn bench_rejected(c: &mut Criterion) {
    let limiter = ChannelRateLimiter::new(SystemClock::shared());
    let limits = RateLimits::new(1, 0);
    let _ = limiter.check_and_record(1, 0, limits);

    c.bench_function("check_and_record_rejected", |b| {
        b.iter(|| {
            let result = limiter.check_and_record(black_box(1), 0, limits);
            black_box(result)
        })
    });
}

fn bench_info(c: &mut Criterion) {
    let limiter = ChannelRateLimiter::new(SystemClock::shared());
    let limits = RateLimits::new(1000, 10000);
    for slot in 0..8 {
        let _ = limiter.check_and_record(1, slot, limits);
    }

    c.bench_function("channel_info_8_slots", |b| {
        b.iter(|| {
            let snapshots = limiter.channel_info(black_box(1), 0..8, limits);
            black_box(snapshots)
        })
    });
}

criterion_group!(benches, bench_check_and_record, bench_rejected, bench_info);

criterion_main!(benches);
