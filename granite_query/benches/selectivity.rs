use criterion::{black_box, criterion_group, criterion_main, Criterion};
use granite_query::histogram::{IntHistogram, StringHistogram};
use granite_query::predicate::Op;

fn bench_int_histogram(c: &mut Criterion) {
    let mut hist = IntHistogram::new(100, 0, 100_000);
    for v in 0..100_000 {
        hist.add_value(v);
    }

    c.bench_function("int_histogram_add", |b| {
        b.iter(|| {
            let mut fresh = IntHistogram::new(100, 0, 100_000);
            for v in (0..100_000).step_by(97) {
                fresh.add_value(black_box(v));
            }
            fresh
        })
    });

    c.bench_function("int_histogram_estimate", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for v in (0..100_000).step_by(1_000) {
                acc += hist.estimate_selectivity(Op::GreaterThan, black_box(v));
                acc += hist.estimate_selectivity(Op::Equals, black_box(v));
            }
            acc
        })
    });
}

fn bench_string_histogram(c: &mut Criterion) {
    let words: Vec<String> = (0..10_000).map(|i| format!("word{i:05}")).collect();
    let mut hist = StringHistogram::new(100);
    for word in &words {
        hist.add_value(word);
    }

    c.bench_function("string_histogram_estimate", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for word in words.iter().step_by(100) {
                acc += hist.estimate_selectivity(Op::Equals, black_box(word));
            }
            acc
        })
    });
}

criterion_group!(benches, bench_int_histogram, bench_string_histogram);
criterion_main!(benches);
