use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cmlink_compare::{compare, joint_optima, Algebra};
use cmlink_model::mocks;

fn bench_score_only(c: &mut Criterion) {
    let m1 = mocks::hairpin();
    let m2 = mocks::branched();

    let mut group = c.benchmark_group("joint_dp");

    group.bench_function("score_self", |b| {
        b.iter(|| joint_optima(black_box(&m1), black_box(&m1), &Algebra::MaxiMin, false).unwrap())
    });

    group.bench_function("score_cross", |b| {
        b.iter(|| joint_optima(black_box(&m1), black_box(&m2), &Algebra::MaxiMin, false).unwrap())
    });

    group.finish();
}

fn bench_full_product(c: &mut Criterion) {
    let m = mocks::hairpin();

    let mut group = c.benchmark_group("full_product");

    group.bench_function("compare_self", |b| {
        b.iter(|| compare(black_box(&m), black_box(&m), false).unwrap())
    });

    group.bench_function("compare_fast_ins", |b| {
        b.iter(|| compare(black_box(&m), black_box(&m), true).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_score_only, bench_full_product);
criterion_main!(benches);
