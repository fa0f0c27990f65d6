use criterion::{criterion_group, criterion_main, Criterion};

use metrics_resiliency::{CountAggregator, PolicyType, ResiliencyMetrics, ResiliencyRecorder};

fn recording_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("recording");

    group.bench_function("uninitialized", |b| {
        let resiliency = ResiliencyMetrics::builder().sink(CountAggregator::new()).build();
        b.iter(|| resiliency.policy_executed("bench-resiliency", PolicyType::Retry))
    });

    group.bench_function("disabled", |b| {
        let resiliency =
            ResiliencyMetrics::builder().enabled(false).sink(CountAggregator::new()).build();
        let _ = resiliency.init("bench-app", "default");
        b.iter(|| resiliency.policy_executed("bench-resiliency", PolicyType::Retry))
    });

    group.bench_function("active/policy_executed", |b| {
        let resiliency = ResiliencyMetrics::builder().sink(CountAggregator::new()).build();
        resiliency.init("bench-app", "default").expect("views should not conflict");
        b.iter(|| resiliency.policy_executed("bench-resiliency", PolicyType::Retry))
    });

    group.bench_function("active/circuit_breaker_open", |b| {
        let resiliency = ResiliencyMetrics::builder().sink(CountAggregator::new()).build();
        resiliency.init("bench-app", "default").expect("views should not conflict");
        b.iter(|| resiliency.circuit_breaker_open("statestore"))
    });

    group.finish();
}

criterion_group!(benches, recording_benchmark);
criterion_main!(benches);
