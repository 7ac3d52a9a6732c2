use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossfilter_engine::{reduce_mean, reduce_sum, Count, Crossfilter, Filter};
use std::time::Duration;

#[derive(Clone, Debug)]
struct Row {
    age: u32,
    origin: u16,
    total: f64,
}

fn bench_rows() -> usize {
    std::env::var("CROSSFILTER_BENCH_ROWS")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| (10_000..=5_000_000).contains(&v))
        .unwrap_or(200_000)
}

fn build_rows(rows: usize) -> Vec<Row> {
    // Deterministic pseudo-random spread so the range filters flip a realistic share of rows.
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..rows)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            Row {
                age: (state % 90) as u32,
                origin: ((state >> 8) % 120) as u16,
                total: ((state >> 16) % 1_000) as f64,
            }
        })
        .collect()
}

fn bench_filter_churn(c: &mut Criterion) {
    let rows = bench_rows();
    let mut cf = Crossfilter::new(build_rows(rows));
    let age = cf.dimension(|r: &Row| r.age);
    let origin = cf.dimension(|r: &Row| r.origin);
    let _by_age = cf.group(&age, Count).unwrap();
    let _by_origin = cf
        .group(&origin, reduce_sum(|r: &Row| r.total))
        .unwrap();
    let mean = cf.group_all(reduce_mean(|r: &Row| r.total));

    let mut group = c.benchmark_group("filter_churn");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(rows as u64));

    group.bench_with_input(BenchmarkId::new("sliding_range", rows), &rows, |b, _| {
        let mut lo = 0u32;
        b.iter(|| {
            lo = (lo + 1) % 60;
            cf.filter_range(&age, lo..lo + 30).unwrap();
            black_box(cf.value(&mean).unwrap().mean());
        })
    });

    group.bench_with_input(BenchmarkId::new("toggle_set", rows), &rows, |b, _| {
        let mut key = 0u16;
        b.iter(|| {
            key = (key + 7) % 120;
            cf.filter(&origin, Some(Filter::one_of([key, key / 2, key / 3])))
                .unwrap();
            black_box(cf.value(&mean).unwrap().count());
        })
    });

    group.bench_with_input(BenchmarkId::new("reset_all", rows), &rows, |b, _| {
        b.iter(|| {
            cf.filter_range(&age, 20..40).unwrap();
            cf.filter_exact(&origin, 3).unwrap();
            cf.filter_all();
            black_box(cf.filtered_count());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_filter_churn);
criterion_main!(benches);
